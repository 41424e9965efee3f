use rstest::rstest;

use super::arbitrary::Value;
use crate::{
    Error, ErrorKind, ErrorSource, ParseState, Position, Reader, ReaderOptions, SyntaxError,
    TokenType, UnsupportedError, UsageError,
};

fn syntax(err: &Error) -> SyntaxError {
    match err.cause() {
        ErrorSource::Syntax(s) => *s,
        other => panic!("expected syntax error, got {other:?}"),
    }
}

fn usage(err: &Error) -> UsageError {
    match err.cause() {
        ErrorSource::Usage(u) => *u,
        other => panic!("expected usage error, got {other:?}"),
    }
}

#[rstest]
#[case(b"i-0e", ErrorKind::Grammar)]
#[case(b"i007e", ErrorKind::Grammar)]
#[case(b"i-007e", ErrorKind::Grammar)]
#[case(b"i9223372036854775808e", ErrorKind::Unsupported)]
#[case(b"5:ab", ErrorKind::Grammar)]
#[case(b"", ErrorKind::Grammar)]
#[case(b"e", ErrorKind::Grammar)]
#[case(b"l", ErrorKind::Grammar)]
#[case(b"d1:a", ErrorKind::Grammar)]
#[case(b"di1ei2ee", ErrorKind::Grammar)]
#[case(b"l i1ee", ErrorKind::Grammar)]
#[case(b"i1ei2e", ErrorKind::Grammar)]
fn rejects_malformed_documents(#[case] input: &[u8], #[case] kind: ErrorKind) {
    let err = Value::decode(input).unwrap_err();
    assert_eq!(err.kind(), kind, "{err}");
}

#[test]
fn premature_string_end_reports_buffer_length() {
    let mut reader = Reader::new(b"5:ab");
    let err = reader.read_string().unwrap_err();
    assert_eq!(syntax(&err), SyntaxError::UnexpectedEndOfInput);
    assert_eq!(err.offset(), 4);
}

#[test]
fn duplicate_key_is_reported_after_full_scan() {
    let input = b"d1:ai1e1:ai2ee";
    let mut reader = Reader::new(input);
    let err = reader.read_dictionary(false).unwrap_err();
    assert_eq!(syntax(&err), SyntaxError::DuplicateKey);
    assert_eq!(err.offset(), 7);
    assert_eq!(reader.position(), Position::new(input.len()));
    assert_eq!(reader.state(), ParseState::Error);
}

#[test]
fn first_of_several_duplicates_is_reported() {
    let mut reader = Reader::new(b"d1:ai1e1:bi2e1:bi3e1:ai4ee");
    let err = reader.read_dictionary(false).unwrap_err();
    assert_eq!(err.offset(), 13);
}

#[test]
fn malformed_value_inside_dictionary_beats_duplicate() {
    let mut reader = Reader::new(b"d1:ai1e1:ai-0ee");
    let err = reader.read_dictionary(false).unwrap_err();
    assert_eq!(syntax(&err), SyntaxError::NegativeZero);
}

#[test]
fn poisoned_reader_fails_fast() {
    let mut reader = Reader::new(b"li1ei2ee");
    reader.read_list_head().unwrap();
    let err = reader.read_string().unwrap_err();
    assert_eq!(syntax(&err), SyntaxError::ExpectedToken(TokenType::String));
    assert_eq!(err.offset(), 1);

    assert_eq!(reader.peek_token_type().unwrap(), TokenType::None);
    assert_eq!(reader.next_token().unwrap_err().kind(), ErrorKind::Usage);
    assert_eq!(
        usage(&reader.read_integer().unwrap_err()),
        UsageError::Poisoned
    );
    assert_eq!(usage(&reader.skip_value().unwrap_err()), UsageError::Poisoned);
    assert_eq!(usage(&reader.finish().unwrap_err()), UsageError::Poisoned);
}

#[rstest]
#[case::key_at_top_level(b"3:abc")]
#[case::tail_at_top_level(b"le")]
fn wrong_operation_for_state_is_a_usage_error(#[case] input: &[u8]) {
    let mut reader = Reader::new(input);
    let err = reader.read_key().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(reader.state(), ParseState::Error);
}

#[test]
fn value_where_key_expected_is_a_usage_error() {
    let mut reader = Reader::new(b"d1:ai1ee");
    reader.read_dictionary_head().unwrap();
    let err = reader.read_integer().unwrap_err();
    assert!(matches!(
        usage(&err),
        UsageError::InvalidOperation {
            state: ParseState::DictionaryKey,
            ..
        }
    ));
}

#[test]
fn mismatched_tail_is_a_usage_error() {
    let mut reader = Reader::new(b"lde");
    reader.read_list_head().unwrap();
    reader.read_dictionary_head().unwrap();
    let err = reader.read_list_tail().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn tail_with_elements_left_is_a_syntax_error() {
    let mut reader = Reader::new(b"li1ee");
    reader.read_list_head().unwrap();
    let err = reader.read_list_tail().unwrap_err();
    assert_eq!(syntax(&err), SyntaxError::ExpectedToken(TokenType::ListTail));
    assert_eq!(err.offset(), 1);
}

#[test]
fn skip_value_refuses_container_end() {
    let mut reader = Reader::new(b"le");
    reader.read_list_head().unwrap();
    let err = reader.skip_value().unwrap_err();
    assert_eq!(usage(&err), UsageError::NotAValue(TokenType::ListTail));
}

#[test]
fn skip_value_reports_truncation() {
    let mut reader = Reader::new(b"li1e");
    let err = reader.skip_value().unwrap_err();
    assert_eq!(syntax(&err), SyntaxError::ExpectedValueOrListEnd);
    assert_eq!(err.offset(), 4);
}

#[test]
fn trailing_data_is_rejected_by_finish() {
    let mut reader = Reader::new(b"i1ei2e");
    assert_eq!(reader.read_integer().unwrap(), 1);
    let err = reader.finish().unwrap_err();
    assert_eq!(syntax(&err), SyntaxError::TrailingData);
    assert_eq!(err.offset(), 3);
}

#[test]
fn finish_before_final_is_incomplete() {
    let mut reader = Reader::new(b"le");
    reader.read_list_head().unwrap();
    assert_eq!(usage(&reader.finish().unwrap_err()), UsageError::Incomplete);
}

#[test]
fn small_output_buffer_is_capacity_exhaustion() {
    let mut reader = Reader::new(b"5:hello");
    let mut out = [0u8; 4];
    let err = reader.read_string_into(&mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(reader.state(), ParseState::Error);
}

#[test]
fn nesting_limit() {
    let options = ReaderOptions::new().with_max_depth(Some(2));
    let mut reader = Reader::with_options(b"llleee", options);
    reader.read_list_head().unwrap();
    reader.read_list_head().unwrap();
    let err = reader.read_list_head().unwrap_err();
    assert_eq!(
        err.cause(),
        &ErrorSource::Unsupported(UnsupportedError::NestingTooDeep { max: 2 })
    );
    assert_eq!(err.offset(), 2);

    let mut reader = Reader::with_options(b"llleee", options);
    assert_eq!(reader.skip_value().unwrap_err().kind(), ErrorKind::Unsupported);

    let mut reader = Reader::with_options(b"llee", options);
    reader.skip_value().unwrap();
}

#[test]
fn integer_overflow_is_unsupported() {
    let mut reader = Reader::new(b"li9223372036854775808ee");
    reader.read_list_head().unwrap();
    let err = reader.read_integer().unwrap_err();
    assert_eq!(
        err.cause(),
        &ErrorSource::Unsupported(UnsupportedError::IntegerOutOfRange)
    );
    assert_eq!(err.offset(), 1);
}
