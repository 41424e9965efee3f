use alloc::vec::Vec;

use bstr::BStr;
use rstest::rstest;

use super::chunk_sink::{ChunkSink, FreshSink};
use crate::{
    ErrorKind, ErrorSource, ParseState, SliceSink, Token, UsageError, VecSink, Writer,
    WriterOptions,
};

fn usage(err: &crate::Error) -> UsageError {
    match err.cause() {
        ErrorSource::Usage(u) => *u,
        other => panic!("expected usage error, got {other:?}"),
    }
}

#[test]
fn writes_nested_dictionary() {
    let mut writer = Writer::new(VecSink::new());
    writer.write_dictionary_head().unwrap();
    writer.write_key("a").unwrap();
    writer.write_integer(1).unwrap();
    writer.write_key("bb").unwrap();
    writer.write_list_head().unwrap();
    writer.write_integer(2).unwrap();
    writer.write_integer(3).unwrap();
    writer.write_list_tail().unwrap();
    writer.write_dictionary_tail().unwrap();
    assert!(writer.is_complete());
    assert_eq!(writer.into_vec().unwrap(), b"d1:ai1e2:bbli2ei3eee");
}

#[rstest]
#[case(0, b"i0e")]
#[case(-42, b"i-42e")]
#[case(i64::MIN, b"i-9223372036854775808e")]
fn writes_minimal_integers(#[case] value: i64, #[case] expected: &[u8]) {
    let mut writer = Writer::new(VecSink::new());
    writer.write_integer(value).unwrap();
    assert_eq!(writer.into_vec().unwrap(), expected);
}

#[rstest]
#[case(b"a", b"b")]
#[case(b"a", b"ab")]
#[case(b"", b"a")]
#[case(b"Z", b"a")]
#[case(b"\x7f", b"\x80")]
fn increasing_keys_are_accepted(#[case] first: &[u8], #[case] second: &[u8]) {
    let mut writer = Writer::new(VecSink::new());
    writer.write_dictionary_head().unwrap();
    writer.write_key(first).unwrap();
    writer.write_integer(1).unwrap();
    writer.write_key(second).unwrap();
    writer.write_integer(2).unwrap();
    writer.write_dictionary_tail().unwrap();
    writer.flush(true).unwrap();
}

#[rstest]
#[case(b"b", b"a")]
#[case(b"a", b"a")]
#[case(b"ab", b"a")]
#[case(b"a", b"")]
fn non_increasing_keys_are_rejected(#[case] first: &[u8], #[case] second: &[u8]) {
    let mut writer = Writer::new(VecSink::new());
    writer.write_dictionary_head().unwrap();
    writer.write_key(first).unwrap();
    writer.write_integer(1).unwrap();
    let err = writer.write_key(second).unwrap_err();
    assert_eq!(usage(&err), UsageError::UnorderedKeys);
    assert_eq!(writer.state(), ParseState::Error);
}

#[test]
fn nested_dictionaries_track_order_independently() {
    let mut writer = Writer::new(VecSink::new());
    writer.write_dictionary_head().unwrap();
    writer.write_key("m").unwrap();
    writer.write_dictionary_head().unwrap();
    // smaller than the enclosing dictionary's key, but in a new scope
    writer.write_key("a").unwrap();
    writer.write_integer(1).unwrap();
    writer.write_key("z").unwrap();
    writer.write_integer(2).unwrap();
    writer.write_dictionary_tail().unwrap();
    // compared against "m", not "z"
    writer.write_key("n").unwrap();
    writer.write_list_head().unwrap();
    writer.write_dictionary_head().unwrap();
    writer.write_key("a").unwrap();
    writer.write_integer(3).unwrap();
    writer.write_dictionary_tail().unwrap();
    writer.write_list_tail().unwrap();
    writer.write_dictionary_tail().unwrap();
    assert_eq!(
        writer.into_vec().unwrap(),
        b"d1:md1:ai1e1:zi2ee1:nld1:ai3eeee"
    );
}

#[test]
fn parent_order_survives_nested_dictionary() {
    let mut writer = Writer::new(VecSink::new());
    writer.write_dictionary_head().unwrap();
    writer.write_key("m").unwrap();
    writer.write_dictionary_head().unwrap();
    writer.write_key("z").unwrap();
    writer.write_integer(1).unwrap();
    writer.write_dictionary_tail().unwrap();
    let err = writer.write_key("b").unwrap_err();
    assert_eq!(usage(&err), UsageError::UnorderedKeys);
}

#[test]
fn key_order_check_can_be_disabled() {
    let options = WriterOptions::new().with_validate_key_order(false);
    let mut writer = Writer::with_options(VecSink::new(), options);
    writer.write_dictionary_head().unwrap();
    writer.write_key("b").unwrap();
    writer.write_integer(1).unwrap();
    writer.write_key("a").unwrap();
    writer.write_integer(2).unwrap();
    writer.write_dictionary_tail().unwrap();
    assert_eq!(writer.into_vec().unwrap(), b"d1:bi1e1:ai2ee");
}

#[test]
fn final_flush_requires_complete_value() {
    let mut writer = Writer::new(VecSink::new());
    writer.write_list_head().unwrap();
    writer.flush(false).unwrap();
    assert_eq!(writer.sink().as_slice(), b"l");
    let err = writer.flush(true).unwrap_err();
    assert_eq!(usage(&err), UsageError::Incomplete);
}

#[test]
fn into_vec_of_incomplete_value_fails() {
    let mut writer = Writer::new(VecSink::new());
    writer.write_dictionary_head().unwrap();
    assert_eq!(writer.into_vec().unwrap_err().kind(), ErrorKind::Usage);
}

#[test]
fn bytes_stay_pending_until_threshold() {
    let mut writer = Writer::new(VecSink::new());
    writer.write_integer(1).unwrap();
    assert_eq!(writer.pending(), 3);
    assert!(writer.sink().as_slice().is_empty());
    writer.flush(true).unwrap();
    assert_eq!(writer.pending(), 0);
    assert_eq!(writer.sink().as_slice(), b"i1e");
}

#[test]
fn commit_threshold_triggers_commit() {
    let options = WriterOptions::new().with_commit_threshold(4);
    let mut writer = Writer::with_options(VecSink::new(), options);
    writer.write_list_head().unwrap();
    assert_eq!(writer.pending(), 1);
    writer.write_integer(12345).unwrap();
    assert_eq!(writer.pending(), 0);
    assert_eq!(writer.sink().as_slice(), b"li12345e");
}

#[test]
fn long_string_streams_through_small_regions() {
    let body: Vec<u8> = (0..100u8).collect();
    let options = WriterOptions::new().with_commit_threshold(16);
    let mut writer = Writer::with_options(ChunkSink::new(8), options);
    writer.write_string(&body).unwrap();
    writer.flush(true).unwrap();
    assert_eq!(writer.bytes_written(), 104);

    let sink = writer.into_inner();
    assert_eq!(&sink.output[..4], b"100:");
    assert_eq!(&sink.output[4..], &body[..]);
    assert!(sink.commits.len() > 1);
    assert!(sink.commits.iter().all(|&n| n <= 8));
}

#[test]
fn small_tokens_batch_into_one_commit() {
    let mut writer = Writer::new(ChunkSink::new(4));
    writer.write_list_head().unwrap();
    for _ in 0..10 {
        writer.write_string("ab").unwrap();
    }
    writer.write_list_tail().unwrap();
    writer.flush(true).unwrap();
    let sink = writer.into_inner();
    assert_eq!(sink.output, b"l2:ab2:ab2:ab2:ab2:ab2:ab2:ab2:ab2:ab2:abe");
    assert_eq!(sink.commits, [42]);
}

#[rstest]
#[case::batched(crate::DEFAULT_COMMIT_THRESHOLD)]
#[case::every_token(0)]
#[case::streamed_bodies(3)]
fn fresh_region_per_request(#[case] threshold: usize) {
    let body: Vec<u8> = (0..200u8).collect();
    let options = WriterOptions::new().with_commit_threshold(threshold);
    let mut writer = Writer::with_options(FreshSink::default(), options);
    writer.write_list_head().unwrap();
    writer.write_integer(1).unwrap();
    writer.write_string(&body).unwrap();
    writer.write_list_tail().unwrap();
    writer.flush(true).unwrap();

    let mut expected = b"li1e200:".to_vec();
    expected.extend_from_slice(&body);
    expected.push(b'e');
    let sink = writer.into_inner();
    assert_eq!(sink.output, expected);
    assert!(sink.requests > 0);
}

#[test]
fn batched_tokens_request_capacity_once() {
    let mut writer = Writer::new(FreshSink::default());
    writer.write_list_head().unwrap();
    writer.write_integer(1).unwrap();
    writer.write_list_tail().unwrap();
    assert_eq!(writer.sink().requests, 0);
    writer.flush(true).unwrap();
    let sink = writer.into_inner();
    assert_eq!(sink.output, b"li1ee");
    assert_eq!(sink.requests, 1);
}

#[test]
fn fixed_region_fits_exactly() {
    let mut storage = [0u8; 7];
    let mut writer = Writer::new(SliceSink::new(&mut storage));
    writer.write_string("hello").unwrap();
    writer.flush(true).unwrap();
    assert_eq!(writer.into_inner().as_slice(), b"5:hello");
}

#[test]
fn fixed_region_exhaustion_poisons() {
    let mut storage = [0u8; 4];
    let mut writer = Writer::new(SliceSink::new(&mut storage));
    writer.write_string("hello").unwrap();
    let err = writer.flush(true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(writer.state(), ParseState::Error);
    assert_eq!(
        usage(&writer.write_integer(1).unwrap_err()),
        UsageError::Poisoned
    );
}

#[test]
fn fixed_region_exhaustion_without_batching() {
    let mut storage = [0u8; 4];
    let options = WriterOptions::new().with_commit_threshold(0);
    let mut writer = Writer::with_options(SliceSink::new(&mut storage), options);
    let err = writer.write_string("hello").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(writer.state(), ParseState::Error);
    assert_eq!(writer.into_inner().as_slice(), b"5:he");
}

#[test]
fn second_top_level_value_is_a_usage_error() {
    let mut writer = Writer::new(VecSink::new());
    writer.write_integer(1).unwrap();
    let err = writer.write_integer(2).unwrap_err();
    assert_eq!(err.offset(), 3);
    assert!(matches!(
        usage(&err),
        UsageError::InvalidOperation {
            state: ParseState::Final,
            ..
        }
    ));
}

#[rstest]
#[case::key_outside_dictionary(Token::Key(BStr::new(b"k")))]
#[case::list_tail_at_top_level(Token::ListTail)]
#[case::dictionary_tail_at_top_level(Token::DictionaryTail)]
fn misplaced_tokens_are_usage_errors(#[case] token: Token<'static>) {
    let mut writer = Writer::new(VecSink::new());
    assert_eq!(writer.write_token(token).unwrap_err().kind(), ErrorKind::Usage);
}

#[test]
fn value_in_key_position_is_a_usage_error() {
    let mut writer = Writer::new(VecSink::new());
    writer.write_dictionary_head().unwrap();
    assert_eq!(
        writer.write_string("v").unwrap_err().kind(),
        ErrorKind::Usage
    );
}

#[test]
fn write_token_mirrors_typed_methods() {
    let tokens = [
        Token::ListHead,
        Token::Integer(-1),
        Token::DictionaryHead,
        Token::Key(BStr::new(b"k")),
        Token::String(BStr::new(b"v")),
        Token::DictionaryTail,
        Token::ListTail,
    ];
    let mut writer = Writer::new(VecSink::new());
    for token in tokens {
        writer.write_token(token).unwrap();
    }
    assert_eq!(writer.depth(), 0);
    assert_eq!(writer.into_vec().unwrap(), b"li-1ed1:k1:vee");
}
