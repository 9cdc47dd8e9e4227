//! Brotli compression of WOFF2 table data.

use std::io;

use brotli::enc::BrotliEncoderParams;

use super::FontWriter;

/// Reads table data in the order of table records, skipping the padding between tables.
struct TableDataReader<'a> {
    writer: &'a FontWriter,
    data_offset: u32,
    table_idx: usize,
    pos_in_table: usize,
}

impl<'a> TableDataReader<'a> {
    fn new(writer: &'a FontWriter) -> Self {
        debug_assert!(
            writer
                .tables
                .windows(2)
                .all(|pair| pair[0].offset + pair[0].length <= pair[1].offset),
            "table records need to be ordered by offsets"
        );
        let data_offset = writer.tables.first().map_or(0, |record| record.offset);
        Self {
            writer,
            data_offset,
            table_idx: 0,
            pos_in_table: 0,
        }
    }
}

impl io::Read for TableDataReader<'_> {
    fn read(&mut self, mut buf: &mut [u8]) -> io::Result<usize> {
        let mut total_read = 0;
        while !buf.is_empty() {
            let Some(table) = self.writer.tables.get(self.table_idx) else {
                break; // all tables are read
            };
            let table_start = (table.offset - self.data_offset) as usize;
            let start = table_start + self.pos_in_table;
            let end = table_start + table.length as usize;
            let remaining = &self.writer.table_data[start..end];

            let chunk_len = remaining.len().min(buf.len());
            let (head, tail) = buf.split_at_mut(chunk_len);
            head.copy_from_slice(&remaining[..chunk_len]);
            buf = tail;
            total_read += chunk_len;

            if chunk_len == remaining.len() {
                self.table_idx += 1;
                self.pos_in_table = 0;
            } else {
                self.pos_in_table += chunk_len;
            }
        }
        Ok(total_read)
    }
}

impl FontWriter {
    pub(super) fn compress_data(&self) -> Vec<u8> {
        let mut reader = TableDataReader::new(self);
        let mut buffer = vec![];
        let params = BrotliEncoderParams::default();
        brotli::BrotliCompress(&mut reader, &mut buffer, &params)
            .expect("reading from and writing to memory never fails");
        buffer
    }
}
