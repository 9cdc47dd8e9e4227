//! Verifies that a generated font subset supports predefined test phrases.

use std::{path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser};
use hanzi_subset::{init_logging, CharSet, TestCase, Verifier, DEFAULT_OUTPUT_FONT};

/// Checks test phrases against the best `cmap` subtable of a font.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the verified font.
    #[arg(long, default_value = DEFAULT_OUTPUT_FONT)]
    font: PathBuf,
    /// Additionally check every char of the curated set.
    #[arg(long)]
    check_charset: bool,
    /// Increases log verbosity; can be repeated.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut verifier = Verifier::new(args.font);
    if args.check_charset {
        verifier = verifier.with_case(TestCase::from_charset(&CharSet::curated()));
    }

    match verifier.run() {
        Ok(report) => {
            println!("{report}");
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            println!("❌ 验证过程出错: {:#}", anyhow::Error::from(err));
            ExitCode::FAILURE
        }
    }
}
