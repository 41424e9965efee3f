#![no_main]

use arbitrary::Arbitrary;
use bencursor::{Reader, ReaderOptions, TokenType, VecSink, Writer, WriterOptions};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    bytes: Vec<u8>,
    max_depth: Option<u8>,
    skip_duplicate_keys: bool,
}

/// Copy the top-level value token by token. Whatever the reader accepts, a
/// writer without the key-order check must reproduce byte for byte.
fn check_copy_through(input: &Input, options: ReaderOptions) {
    let mut reader = Reader::with_options(&input.bytes, options);
    let lenient = WriterOptions::new().with_validate_key_order(false);
    let mut writer = Writer::with_options(VecSink::new(), lenient);
    loop {
        match reader.next_token() {
            Ok(Some(token)) => writer
                .write_token(token)
                .expect("writer rejected a token the reader accepted"),
            Ok(None) => break,
            Err(_) => {
                assert_eq!(reader.peek_token_type().unwrap(), TokenType::None);
                return;
            }
        }
    }
    let consumed = reader.position().offset();
    let output = writer.into_vec().expect("complete value must flush");
    assert_eq!(output, &input.bytes[..consumed]);
}

/// Whole-value skipping and indexing must agree with the token walk on where
/// the value ends.
fn check_skip_and_index(input: &Input, options: ReaderOptions) {
    let mut walk = Reader::with_options(&input.bytes, options);
    let walked = loop {
        match walk.next_token() {
            Ok(Some(_)) => {}
            Ok(None) => break Some(walk.position()),
            Err(_) => break None,
        }
    };

    let mut skip = Reader::with_options(&input.bytes, options);
    let skipped = skip.skip_value().ok().map(|()| skip.position());
    assert_eq!(walked, skipped);

    let mut index = Reader::with_options(&input.bytes, options);
    match index.peek_token_type() {
        Ok(TokenType::DictionaryHead) => {
            if let Ok(dict) = index.read_dictionary(input.skip_duplicate_keys) {
                assert_eq!(Some(index.position()), walked);
                let keys: Vec<_> = dict.keys().collect();
                assert!(keys.windows(2).all(|w| w[0] < w[1]));
                for position in dict.positions() {
                    let mut value = Reader::with_options(&input.bytes, options);
                    value.seek(position).unwrap();
                    value.skip_value().expect("indexed value must be readable");
                }
            }
        }
        Ok(TokenType::ListHead) => {
            if let Ok(list) = index.read_list() {
                assert_eq!(Some(index.position()), walked);
                for position in &list {
                    let mut value = Reader::with_options(&input.bytes, options);
                    value.seek(position).unwrap();
                    value.skip_value().expect("indexed value must be readable");
                }
            }
        }
        _ => {}
    }
}

fuzz_target!(|input: Input| {
    let options = ReaderOptions::new().with_max_depth(input.max_depth.map(usize::from));
    check_copy_through(&input, options);
    check_skip_and_index(&input, options);
});
