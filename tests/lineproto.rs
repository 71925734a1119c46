//! Line framer end-to-end behavior, including interop with a zlib
//! stream produced by another implementation.

use std::io::Read;

use dcwire::line::{Reader, Writer};
use dcwire::DcError;

/// A complete zlib stream containing `$OtherCommand test|`, captured
/// from a hub implementation that flushes and closes the stream per
/// compressed segment.
const FOREIGN_ZLIB: &[u8] = &[
    120, 156, 82, 241, 47, 201, 72, 45, 114, 206, 207, 205, 77, 204, 75, 81, 40, 73, 45, 46,
    169, 1, 4, 0, 0, 255, 255, 69, 30, 7, 66,
];

#[test]
fn test_zon_switch_with_foreign_stream() {
    let mut stream = Vec::new();
    stream.extend_from_slice(b"$ZOn|");
    stream.extend_from_slice(FOREIGN_ZLIB);
    stream.extend_from_slice(b"$Uncompressed|");

    let mut r = Reader::new(&stream[..], b'|');
    assert_eq!(r.read_line().unwrap().unwrap(), b"$ZOn|");
    r.enable_inflate().unwrap();
    assert_eq!(r.read_line().unwrap().unwrap(), b"$OtherCommand test|");
    assert_eq!(r.read_line().unwrap().unwrap(), b"$Uncompressed|");
    assert!(r.read_line().unwrap().is_none());
}

#[test]
fn test_zon_switch_twice_with_binary_windows() {
    let mut stream = Vec::new();
    stream.extend_from_slice(b"$ZOn|");
    stream.extend_from_slice(FOREIGN_ZLIB);
    stream.extend_from_slice(b"$Uncompressed|$ZOn2|");
    stream.extend_from_slice(FOREIGN_ZLIB);
    stream.extend_from_slice(b"$Uncompressed2|");
    stream.extend_from_slice(b"binary");
    stream.extend_from_slice(b"$command3|");
    stream.extend_from_slice(b"2nary");
    stream.extend_from_slice(b"$command4|");

    let mut r = Reader::new(&stream[..], b'|');

    assert_eq!(r.read_line().unwrap().unwrap(), b"$ZOn|");
    r.enable_inflate().unwrap();
    assert_eq!(r.read_line().unwrap().unwrap(), b"$OtherCommand test|");
    assert_eq!(r.read_line().unwrap().unwrap(), b"$Uncompressed|");

    assert_eq!(r.read_line().unwrap().unwrap(), b"$ZOn2|");
    r.enable_inflate().unwrap();
    assert_eq!(r.read_line().unwrap().unwrap(), b"$OtherCommand test|");
    assert_eq!(r.read_line().unwrap().unwrap(), b"$Uncompressed2|");

    let mut br = r.binary(6);
    let mut data = Vec::new();
    br.read_to_end(&mut data).unwrap();
    assert_eq!(data, b"binary");
    br.close().unwrap();

    assert_eq!(r.read_line().unwrap().unwrap(), b"$command3|");

    // partial read; close drains the remainder of the window
    let mut br = r.binary(5);
    let mut part = [0u8; 3];
    br.read_exact(&mut part).unwrap();
    assert_eq!(&part, b"2na");
    br.close().unwrap();

    assert_eq!(r.read_line().unwrap().unwrap(), b"$command4|");
}

#[test]
fn test_writer_reader_compression_roundtrip() {
    let mut w = Writer::new(Vec::new());
    let mut lines: Vec<Vec<u8>> = Vec::new();
    let mut write = |w: &mut Writer<Vec<u8>>, s: &[u8]| {
        w.write_line(s).unwrap();
        lines.push(s.to_vec());
    };

    write(&mut w, b"$ZOn|");
    w.enable_deflate().unwrap();
    write(&mut w, b"$OtherCommand test|");
    w.disable_deflate().unwrap();
    write(&mut w, b"$Uncompressed|");
    write(&mut w, b"$ZOn2|");
    w.enable_deflate().unwrap();
    write(&mut w, b"$OtherCommand test|");
    write(&mut w, b"$Compressed2|");
    w.flush().unwrap();
    // zlib stays open after a sync flush
    write(&mut w, b"$Compressed3|");
    w.flush().unwrap();

    let stream = w.into_inner();
    let mut r = Reader::new(&stream[..], b'|');
    for exp in &lines {
        let line = r.read_line().unwrap().unwrap();
        assert_eq!(line, &exp[..]);
        if exp.starts_with(b"$ZOn") {
            r.enable_inflate().unwrap();
        }
    }
    assert!(r.is_inflating());
}

#[test]
fn test_max_line_failure_is_sticky_until_realigned() {
    let mut data = vec![b'x'; 200];
    data.push(b'|');
    data.extend_from_slice(b"$ok|");

    let mut r = Reader::new(&data[..], b'|');
    r.set_max_line(64);
    assert!(matches!(r.read_line(), Err(DcError::Limit("line"))));
    assert!(matches!(r.read_line(), Err(DcError::Limit("line"))));
}

#[test]
fn test_lines_delivered_in_order() {
    let mut stream = Vec::new();
    for i in 0..100 {
        stream.extend_from_slice(format!("$cmd{} arg|", i).as_bytes());
    }
    let mut r = Reader::new(&stream[..], b'|');
    for i in 0..100 {
        let line = r.read_line().unwrap().unwrap();
        assert_eq!(line, format!("$cmd{} arg|", i).as_bytes());
    }
    assert!(r.read_line().unwrap().is_none());
}
