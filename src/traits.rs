use bytes::BytesMut;

/// Types with a fast-import wire form
pub trait FastImportWriter {
    fn write_to(&self, buffer: &mut BytesMut);

    fn to_bytes(&self) -> BytesMut {
        let mut buffer = BytesMut::new();
        self.write_to(&mut buffer);
        buffer
    }
}
