use std::cell::{Cell, RefCell};
use std::io::{BufReader, Cursor};
use std::rc::Rc;

use xdr_stream::read::handlers::{self, BufferSink, PrimitiveHandler, Shared};
use xdr_stream::read::{factory, padding};
use xdr_stream::{
    DecodeState, EmptyReadState, Error, FixedLengthArrayReadState, FixedLengthOpaqueReadState,
    PrimitiveReadState, ReadState, TaggedUnionReadState, VariableLengthArrayReadState,
    VariableLengthOpaqueReadState, decode_bytes, decode_from_reader,
};

fn shared<T: Default>() -> Shared<T> {
    Rc::new(RefCell::new(T::default()))
}

/// Feeds `chunks` in order the way a transport would. Every byte of a
/// non-empty chunk must be used, and completion may only come with the
/// last byte.
fn feed<S: ReadState + ?Sized>(state: &mut S, chunks: &[&[u8]]) -> bool {
    let mut done = false;
    for chunk in chunks.iter().filter(|c| !c.is_empty()) {
        assert!(!done, "state completed before its input ran out");
        let (read, complete) = state.consume(chunk);
        assert_eq!(read, chunk.len());
        done = complete;
    }
    done
}

fn uint_array(max: u32) -> (VariableLengthArrayReadState, Shared<Vec<u32>>) {
    let values = shared::<Vec<u32>>();
    let target = values.clone();
    let state = VariableLengthArrayReadState::new(
        max,
        factory(move |_, _| Ok(Some(handlers::collect_uint(target.clone())))),
    )
    .with_name("values");
    (state, values)
}

const ONE_TWO_THREE: [u8; 16] = [0, 0, 0, 3, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3];

// ══════════════════════════════════════════════════════════════════════════
// Primitives
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn test_primitive_width_must_be_4_or_8() {
    assert!(matches!(
        PrimitiveReadState::new(3),
        Err(Error::InvalidPrimitiveSize(3))
    ));
    let mut state = PrimitiveReadState::new(8).unwrap();
    assert_eq!(state.reset_width(5), Err(Error::InvalidPrimitiveSize(5)));
    assert_eq!(state.width(), 8);
    state.reset_width(4).unwrap();
    assert_eq!(state.width(), 4);
}

#[test]
fn test_primitive_never_reads_past_its_width() {
    let mut state = PrimitiveReadState::word();
    assert_eq!(state.consume(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02]), (4, true));
    assert_eq!(state.consume(&[0x03]), (0, true));
    assert_eq!(state.as_uint().unwrap(), 0xDEADBEEF);
    assert_eq!(state.as_int().unwrap(), 0xDEADBEEFu32 as i32);
    state.finalize().unwrap();
}

#[test]
fn test_primitive_missing_bytes() {
    let mut state = PrimitiveReadState::word();
    assert_eq!(state.consume(&[0, 0]), (2, false));
    assert_eq!(
        state.finalize(),
        Err(Error::MissingBytes { missing: 2, size: 4 })
    );
    assert_eq!(
        state.as_uint(),
        Err(Error::MissingBytes { missing: 2, size: 4 })
    );
}

#[test]
fn test_primitive_hyper_accessors() {
    let mut state = PrimitiveReadState::hyper();
    assert_eq!(state.consume(&(-2i64).to_be_bytes()), (8, true));
    assert_eq!(state.as_hyper_int().unwrap(), -2);
    assert_eq!(state.as_hyper_uint().unwrap(), u64::MAX - 1);
    assert_eq!(
        state.as_int(),
        Err(Error::PrimitiveSizeMismatch { expected: 4, actual: 8 })
    );

    state.reset();
    assert!(!state.is_filled());
    state.consume(&std::f64::consts::PI.to_bits().to_be_bytes());
    assert_eq!(state.as_double().unwrap().to_bits(), std::f64::consts::PI.to_bits());
}

#[test]
fn test_primitive_float() {
    let mut state = PrimitiveReadState::word();
    for byte in 1.5f32.to_bits().to_be_bytes() {
        state.consume(&[byte]);
    }
    assert_eq!(state.as_float().unwrap(), 1.5);
    assert!(state.as_double().is_err());
}

// ══════════════════════════════════════════════════════════════════════════
// Variable-length arrays: the 3-element scenario
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn test_var_array_split_5_then_11() {
    let (mut state, values) = uint_array(10);
    assert_eq!(state.consume(&ONE_TWO_THREE[..5]), (5, false));
    assert_eq!(state.consume(&ONE_TWO_THREE[5..]), (11, true));
    state.finalize().unwrap();
    assert_eq!(*values.borrow(), [1, 2, 3]);
    assert_eq!(state.length(), Some(3));
}

#[test]
fn test_var_array_truncated_after_10_bytes() {
    let (mut state, values) = uint_array(10);
    assert_eq!(state.consume(&ONE_TWO_THREE[..10]), (10, false));
    let err = state.finalize().unwrap_err();
    assert!(err.is_missing_bytes());
    assert_eq!(
        err,
        Error::Element {
            index: 1,
            count: 3,
            source: Box::new(Error::MissingBytes { missing: 2, size: 4 }),
        }
    );
    assert_eq!(*values.borrow(), [1]);
}

#[test]
fn test_var_array_every_chunking() {
    for first in 0..=ONE_TWO_THREE.len() {
        for second in first..=ONE_TWO_THREE.len() {
            let (mut state, values) = uint_array(3);
            let done = feed(
                &mut state,
                &[
                    &ONE_TWO_THREE[..first],
                    &ONE_TWO_THREE[first..second],
                    &ONE_TWO_THREE[second..],
                ],
            );
            assert!(done, "split at {first}/{second}");
            state.finalize().unwrap();
            assert_eq!(*values.borrow(), [1, 2, 3], "split at {first}/{second}");
        }
    }
}

#[test]
fn test_var_array_over_max_never_enters_body() {
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let mut state = VariableLengthArrayReadState::new(
        2,
        factory(move |_, _| {
            seen.set(seen.get() + 1);
            Ok(Some(DecodeState::empty()))
        }),
    );
    assert_eq!(state.consume(&ONE_TWO_THREE), (4, true));
    assert_eq!(
        state.finalize(),
        Err(Error::MaxLengthExceeded {
            kind: "Variable-length array",
            max: 2,
            got: 3,
        })
    );
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_var_array_empty_needs_only_the_prefix() {
    let (mut state, values) = uint_array(10);
    assert_eq!(state.consume(&[0, 0, 0, 0, 0xFF]), (4, true));
    state.finalize().unwrap();
    assert!(values.borrow().is_empty());
}

#[test]
fn test_var_array_finalize_without_input() {
    let (mut state, _) = uint_array(10);
    assert_eq!(
        state.finalize(),
        Err(Error::MissingBytes { missing: 4, size: 4 })
    );
}

#[test]
fn test_var_array_reset_and_reuse() {
    let (mut state, values) = uint_array(10);
    assert_eq!(decode_bytes(&mut state, &ONE_TWO_THREE).unwrap(), 16);
    state.reset();
    assert_eq!(decode_bytes(&mut state, &[0, 0, 0, 1, 0, 0, 0, 42]).unwrap(), 8);
    assert_eq!(*values.borrow(), [1, 2, 3, 42]);
}

// ══════════════════════════════════════════════════════════════════════════
// Fixed-length arrays
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn test_fixed_array_builds_children_lazily() {
    let indices = shared::<Vec<(u32, u32)>>();
    let log = indices.clone();
    let values = shared::<Vec<i32>>();
    let target = values.clone();
    let mut state = FixedLengthArrayReadState::new(
        3,
        factory(move |index, count| {
            log.borrow_mut().push((index, count));
            Ok(Some(handlers::collect_int(target.clone())))
        }),
    );

    assert_eq!(state.consume(&[0xFF, 0xFF, 0xFF, 0xFE, 0, 0]), (6, false));
    assert_eq!(*indices.borrow(), [(0, 3), (1, 3)]);
    assert_eq!(*values.borrow(), [-2]);

    assert_eq!(state.consume(&[0, 5, 0, 0, 0, 6, 0xAA]), (6, true));
    state.finalize().unwrap();
    assert_eq!(*indices.borrow(), [(0, 3), (1, 3), (2, 3)]);
    assert_eq!(*values.borrow(), [-2, 5, 6]);
}

#[test]
fn test_fixed_array_of_voids_completes_without_input() {
    let mut state = FixedLengthArrayReadState::new(
        3,
        factory(|_, _| Ok(Some(DecodeState::from(EmptyReadState)))),
    );
    assert_eq!(state.consume(&[]), (0, true));
    state.finalize().unwrap();

    state.reset();
    state.finalize().unwrap();
}

#[test]
fn test_fixed_array_finalize_names_first_missing_element() {
    let values = shared::<Vec<u32>>();
    let target = values.clone();
    let mut state = FixedLengthArrayReadState::new(
        3,
        factory(move |_, _| Ok(Some(handlers::collect_uint(target.clone())))),
    );
    state.consume(&[0, 0, 0, 7]);
    assert_eq!(
        state.finalize(),
        Err(Error::Element {
            index: 1,
            count: 3,
            source: Box::new(Error::MissingBytes { missing: 4, size: 4 }),
        })
    );
}

#[test]
fn test_fixed_array_factory_without_handler() {
    let mut state = FixedLengthArrayReadState::new(2, factory(|_, _| Ok(None)));
    assert_eq!(state.consume(&[0, 0, 0, 1]), (0, true));
    assert_eq!(
        state.finalize(),
        Err(Error::MissingHandler { index: 0, count: 2 })
    );
}

#[test]
fn test_fixed_array_factory_error_carries_index() {
    let mut state = FixedLengthArrayReadState::new(
        2,
        factory(|index, _| {
            if index == 1 {
                Err(Error::custom("no schema for element"))
            } else {
                Ok(Some(PrimitiveReadState::word().into()))
            }
        }),
    );
    assert_eq!(state.consume(&[0, 0, 0, 1, 0, 0]), (4, true));
    let err = state.finalize().unwrap_err();
    assert_eq!(err.to_string(), "element 1 of 2: no schema for element");
}

/// An XDR struct is a fixed sequence of differently typed fields.
#[test]
fn test_fixed_array_as_struct() {
    let ids = shared::<Vec<u64>>();
    let name = BufferSink::new();
    let (id_target, name_target) = (ids.clone(), name.clone());
    let mut state = FixedLengthArrayReadState::new(
        2,
        factory(move |index, _| {
            Ok(match index {
                0 => Some(handlers::collect_hyper_uint(id_target.clone())),
                1 => Some(VariableLengthOpaqueReadState::new(255, name_target.clone().into()).into()),
                _ => None,
            })
        }),
    );
    let wire = [0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 2, b'o', b'k', 0, 0];
    assert_eq!(decode_bytes(&mut state, &wire).unwrap(), 16);
    assert_eq!(*ids.borrow(), [256]);
    assert_eq!(name.take(), b"ok");
}

// ══════════════════════════════════════════════════════════════════════════
// Opaque data
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn test_padding_values() {
    for (length, pad) in [(0, 0), (1, 3), (2, 2), (3, 1), (4, 0), (5, 3)] {
        assert_eq!(padding(length), pad);
        assert_eq!((length + padding(length)) % 4, 0);
    }
}

#[test]
fn test_fixed_opaque_skips_padding() {
    for length in [0u32, 1, 3, 4, 5] {
        let payload: Vec<u8> = (1..=length as u8).collect();
        let mut wire = payload.clone();
        wire.resize((length + padding(length)) as usize, 0);
        wire.extend([0xEE; 4]);

        let sink = BufferSink::new();
        let mut state = FixedLengthOpaqueReadState::new(length, sink.clone().into());
        let used = decode_bytes(&mut state, &wire).unwrap();
        assert_eq!(used as u32, length + padding(length));
        assert_eq!(sink.take(), payload);

        // One byte at a time
        state.reset();
        let used = wire[..used]
            .chunks(1)
            .map(|byte| state.consume(byte).0)
            .sum::<usize>();
        assert_eq!(used as u32, length + padding(length));
        state.finalize().unwrap();
        assert_eq!(sink.take(), payload);
    }
}

#[test]
fn test_fixed_opaque_truncated_in_padding() {
    let sink = BufferSink::new();
    let mut state = FixedLengthOpaqueReadState::new(5, sink.clone().into());
    assert_eq!(state.consume(&[1, 2, 3, 4, 5, 0]), (6, false));
    let err = state.finalize().unwrap_err();
    assert_eq!(err, Error::MissingOpaqueBytes { missing: 2, expected: 8 });
    assert!(err.is_missing_bytes());
    assert_eq!(sink.take(), [1, 2, 3, 4, 5]);
}

#[test]
fn test_var_opaque_over_max() {
    let sink = BufferSink::new();
    let mut state = VariableLengthOpaqueReadState::new(4, sink.clone().into());
    assert_eq!(state.consume(&[0, 0, 0, 5, 1, 2, 3, 4, 5, 0, 0, 0]), (4, true));
    assert_eq!(
        state.finalize(),
        Err(Error::MaxLengthExceeded {
            kind: "Variable-length opaque data",
            max: 4,
            got: 5,
        })
    );
    assert!(sink.take().is_empty());
}

#[test]
fn test_var_opaque_zero_length_after_prefix_only() {
    let sink = BufferSink::new();
    let mut state = VariableLengthOpaqueReadState::new(4, sink.clone().into());
    assert_eq!(state.consume(&[0, 0]), (2, false));
    assert_eq!(state.consume(&[0, 0]), (2, true));
    state.finalize().unwrap();
    assert_eq!(state.length(), Some(0));
}

#[test]
fn test_var_opaque_finalize_with_prefix_and_no_body() {
    let mut state = VariableLengthOpaqueReadState::new(8, BufferSink::new().into());
    assert_eq!(state.consume(&[0, 0, 0, 2]), (4, false));
    assert_eq!(
        state.finalize(),
        Err(Error::MissingOpaqueBytes { missing: 4, expected: 4 })
    );
}

#[test]
fn test_fixed_opaque_length_overflow() {
    let mut state = FixedLengthOpaqueReadState::new(u32::MAX, BufferSink::new().into());
    assert_eq!(state.consume(&[0]), (0, true));
    assert!(matches!(state.finalize(), Err(Error::RangeOverflow(_))));
}

struct Greedy;

impl ReadState for Greedy {
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool) {
        (bytes.len() + 1, false)
    }
    fn finalize(&mut self) -> xdr_stream::Result<()> {
        Ok(())
    }
    fn reset(&mut self) {}
}

struct Refusing;

impl ReadState for Refusing {
    fn consume(&mut self, _bytes: &[u8]) -> (usize, bool) {
        (0, false)
    }
    fn finalize(&mut self) -> xdr_stream::Result<()> {
        Ok(())
    }
    fn reset(&mut self) {}
}

struct Rejecting;

impl ReadState for Rejecting {
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool) {
        (bytes.len(), false)
    }
    fn finalize(&mut self) -> xdr_stream::Result<()> {
        Err(Error::custom("bad checksum"))
    }
    fn reset(&mut self) {}
}

#[test]
fn test_sink_over_read_is_fatal() {
    let mut state = FixedLengthOpaqueReadState::new(4, DecodeState::custom(Greedy));
    assert_eq!(state.consume(&[1, 2, 3, 4]), (0, true));
    assert_eq!(
        state.finalize(),
        Err(Error::OverRead {
            what: "Opaque data handler",
            read: 5,
            offered: 4,
        })
    );
}

#[test]
fn test_array_element_over_read_is_fatal() {
    let mut state =
        FixedLengthArrayReadState::new(1, factory(|_, _| Ok(Some(DecodeState::custom(Greedy)))));
    assert_eq!(state.consume(&[1, 2]), (0, true));
    assert!(matches!(
        state.finalize(),
        Err(Error::OverRead { what: "Array element read state", read: 3, offered: 2 })
    ));
}

#[test]
fn test_stalled_sink() {
    let mut state = FixedLengthOpaqueReadState::new(4, DecodeState::custom(Refusing));
    assert_eq!(state.consume(&[1, 2]), (0, true));
    assert_eq!(
        state.finalize(),
        Err(Error::Stalled { what: "Opaque data handler", offered: 2 })
    );
}

#[test]
fn test_sink_finalize_error_is_named() {
    let mut state =
        FixedLengthOpaqueReadState::new(2, DecodeState::custom(Rejecting)).with_name("payload");
    state.consume(&[1, 2, 0, 0]);
    let err = state.finalize().unwrap_err();
    assert_eq!(err.to_string(), "payload reported error: bad checksum");
    assert_eq!(err.root_cause(), &Error::custom("bad checksum"));

    let mut anonymous = FixedLengthOpaqueReadState::new(0, DecodeState::custom(Rejecting));
    assert_eq!(
        anonymous.finalize().unwrap_err().to_string(),
        "Opaque data handler reported error: bad checksum"
    );
}

/// Fails on its first chunk, reporting completion the way read states do.
struct Corrupt;

impl ReadState for Corrupt {
    fn consume(&mut self, _bytes: &[u8]) -> (usize, bool) {
        (0, true)
    }
    fn finalize(&mut self) -> xdr_stream::Result<()> {
        Err(Error::custom("corrupt frame"))
    }
    fn reset(&mut self) {}
}

#[test]
fn test_sink_failing_during_consume_is_reported() {
    let mut state = FixedLengthOpaqueReadState::new(4, DecodeState::custom(Corrupt));
    assert_eq!(state.consume(&[1, 2, 3, 4]), (0, true));
    let err = state.finalize().unwrap_err();
    assert_eq!(
        err,
        Error::OpaqueHandler {
            name: String::new(),
            source: Box::new(Error::custom("corrupt frame")),
        }
    );
    assert_eq!(err.root_cause(), &Error::custom("corrupt frame"));
}

#[test]
fn test_nested_decoder_sink_error_keeps_handler_name() {
    let inner = VariableLengthOpaqueReadState::new(2, BufferSink::new().into());
    let mut state = FixedLengthOpaqueReadState::new(8, inner.into()).with_name("auth body");
    assert_eq!(state.consume(&[0, 0, 0, 5, 1, 2, 3, 4]), (4, true));

    let too_long = Error::MaxLengthExceeded {
        kind: "Variable-length opaque data",
        max: 2,
        got: 5,
    };
    let err = state.finalize().unwrap_err();
    assert_eq!(
        err,
        Error::OpaqueHandler {
            name: "auth body".to_string(),
            source: Box::new(too_long.clone()),
        }
    );
    assert_eq!(err.root_cause(), &too_long);
    assert_eq!(
        err.to_string(),
        "auth body reported error: Variable-length opaque data has maximum length 2, \
         but encountered length 5"
    );

    assert_eq!(state.consume(&[0; 4]), (0, true));
    assert_eq!(state.finalize(), Err(err));
}

#[test]
fn test_nested_decoder_sink_shorter_than_payload() {
    let mut state = FixedLengthOpaqueReadState::new(8, PrimitiveReadState::word().into());
    assert_eq!(state.consume(&[0, 0, 0, 1, 0, 0, 0, 2]), (4, true));
    assert_eq!(
        state.finalize(),
        Err(Error::HandlerFinishedEarly {
            name: String::new(),
            remaining: 4,
        })
    );

    let mut exact = FixedLengthOpaqueReadState::new(4, PrimitiveReadState::word().into());
    assert_eq!(exact.consume(&[0, 0, 0, 1, 0xFF]), (4, true));
    exact.finalize().unwrap();
}

#[test]
fn test_failure_reports_bytes_used_before_it() {
    let mut state = FixedLengthArrayReadState::new(
        2,
        factory(|index, _| {
            Ok(match index {
                0 => Some(PrimitiveReadState::word().into()),
                _ => None,
            })
        }),
    );
    assert_eq!(state.consume(&[0, 0, 0, 1, 9, 9]), (4, true));
    assert_eq!(
        state.finalize(),
        Err(Error::MissingHandler { index: 1, count: 2 })
    );
    assert_eq!(state.consume(&[9, 9]), (0, true));
}

// ══════════════════════════════════════════════════════════════════════════
// Sticky errors
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn test_error_is_sticky_until_reset() {
    let sink = BufferSink::new();
    let mut state = VariableLengthOpaqueReadState::new(2, sink.clone().into());
    state.consume(&[0, 0, 0, 9]);
    let first = state.finalize().unwrap_err();

    assert_eq!(state.consume(&[0, 0, 0, 1, 7, 0, 0, 0]), (0, true));
    assert_eq!(state.finalize(), Err(first.clone()));
    assert_eq!(state.finalize(), Err(first));
    assert!(sink.take().is_empty());

    state.reset();
    assert_eq!(state.consume(&[0, 0, 0, 1, 7, 0, 0, 0]), (8, true));
    state.finalize().unwrap();
    assert_eq!(sink.take(), [7]);
}

#[test]
fn test_primitive_handler_callback_error_is_sticky() {
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let mut state = PrimitiveHandler::new(PrimitiveReadState::word(), move |p| {
        seen.set(seen.get() + 1);
        match p.as_uint()? {
            0 => Err(Error::custom("zero is reserved")),
            _ => Ok(()),
        }
    });
    state.consume(&[0, 0, 0, 0]);
    assert!(state.finalize().is_err());
    assert!(state.finalize().is_err());
    assert_eq!(calls.get(), 1);
}

// ══════════════════════════════════════════════════════════════════════════
// Tagged unions
// ══════════════════════════════════════════════════════════════════════════

fn status_union() -> (TaggedUnionReadState, Shared<Vec<u32>>, Shared<Vec<i64>>) {
    let a = shared::<Vec<u32>>();
    let b = shared::<Vec<i64>>();
    let (a_target, b_target) = (a.clone(), b.clone());
    let state = TaggedUnionReadState::new(factory(move |tag, count| {
        assert_eq!(count, 0);
        Ok(match tag {
            0 => Some(handlers::collect_uint(a_target.clone())),
            1 => Some(handlers::collect_hyper_int(b_target.clone())),
            2 => Some(DecodeState::empty()),
            _ => None,
        })
    }))
    .with_name("status");
    (state, a, b)
}

#[test]
fn test_union_dispatch() {
    let (mut state, a, b) = status_union();
    assert_eq!(decode_bytes(&mut state, &[0, 0, 0, 0, 0, 0, 0, 5]).unwrap(), 8);
    assert_eq!(state.discriminant(), Some(0));

    state.reset();
    let wire = [0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xF6];
    assert_eq!(decode_bytes(&mut state, &wire).unwrap(), 12);

    assert_eq!(*a.borrow(), [5]);
    assert_eq!(*b.borrow(), [-10]);
}

#[test]
fn test_union_unrecognized_discriminant() {
    let (mut state, _, _) = status_union();
    assert_eq!(state.consume(&[0, 0, 0, 99, 1, 2, 3, 4]), (4, true));
    let err = state.finalize().unwrap_err();
    assert_eq!(
        err,
        Error::UnrecognizedDiscriminant {
            discriminant: 99,
            name: "status".to_string(),
        }
    );
    assert_eq!(err.to_string(), "status reported unrecognized discriminant: 99");
}

#[test]
fn test_union_void_arm() {
    let (mut state, _, _) = status_union();
    assert_eq!(state.consume(&[0, 0, 0, 2, 0xAB]), (4, true));
    state.finalize().unwrap();
    assert!(matches!(state.arm(), Some(DecodeState::Empty(_))));
}

#[test]
fn test_union_truncated_discriminant() {
    let (mut state, _, _) = status_union();
    assert_eq!(state.consume(&[0, 0, 0]), (3, false));
    assert_eq!(
        state.finalize(),
        Err(Error::MissingBytes { missing: 1, size: 4 })
    );
    assert_eq!(state.discriminant(), None);
}

#[test]
fn test_union_truncated_arm() {
    let (mut state, _, b) = status_union();
    assert_eq!(state.consume(&[0, 0, 0, 1, 0, 0]), (6, false));
    assert_eq!(
        state.finalize(),
        Err(Error::MissingBytes { missing: 6, size: 8 })
    );
    assert!(b.borrow().is_empty());
}

// ══════════════════════════════════════════════════════════════════════════
// Nested composition and chunking invariance
// ══════════════════════════════════════════════════════════════════════════

/// `union switch (unsigned tag) { case 0: unsigned n; case 1: opaque s<8>; case 2: void; } items<4>`
fn nested_schema() -> (VariableLengthArrayReadState, Shared<Vec<u32>>, BufferSink) {
    let numbers = shared::<Vec<u32>>();
    let text = BufferSink::new();
    let (n, t) = (numbers.clone(), text.clone());
    let state = VariableLengthArrayReadState::new(
        4,
        factory(move |_, _| {
            let (n, t) = (n.clone(), t.clone());
            let item = TaggedUnionReadState::new(factory(move |tag, _| {
                Ok(match tag {
                    0 => Some(handlers::collect_uint(n.clone())),
                    1 => Some(VariableLengthOpaqueReadState::new(8, t.clone().into()).into()),
                    2 => Some(DecodeState::empty()),
                    _ => None,
                })
            }))
            .with_name("item");
            Ok(Some(item.into()))
        }),
    )
    .with_name("items");
    (state, numbers, text)
}

const NESTED: [u8; 40] = [
    0, 0, 0, 4, // four items
    0, 0, 0, 0, 0, 0, 0, 7, // number 7
    0, 0, 0, 1, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o', 0, 0, 0, // "hello"
    0, 0, 0, 2, // void
    0, 0, 0, 0, 0, 0, 0, 9, // number 9
];

#[test]
fn test_nested_whole_buffer() {
    let (mut state, numbers, text) = nested_schema();
    assert_eq!(state.consume(&NESTED), (40, true));
    state.finalize().unwrap();
    assert_eq!(*numbers.borrow(), [7, 9]);
    assert_eq!(text.take(), b"hello");
}

#[test]
fn test_nested_every_two_way_and_three_way_split() {
    for first in 0..=NESTED.len() {
        for second in first..=NESTED.len() {
            let (mut state, numbers, text) = nested_schema();
            let chunks: [&[u8]; 3] = [&NESTED[..first], &NESTED[first..second], &NESTED[second..]];
            assert!(feed(&mut state, &chunks), "split at {first}/{second}");
            state.finalize().unwrap();
            assert_eq!(*numbers.borrow(), [7, 9], "split at {first}/{second}");
            assert_eq!(text.take(), b"hello", "split at {first}/{second}");
        }
    }
}

#[test]
fn test_nested_single_bytes() {
    let (mut state, numbers, text) = nested_schema();
    let chunks: Vec<&[u8]> = NESTED.chunks(1).collect();
    assert!(feed(&mut state, &chunks));
    state.finalize().unwrap();
    assert_eq!(*numbers.borrow(), [7, 9]);
    assert_eq!(text.take(), b"hello");
}

#[test]
fn test_nested_every_truncation_fails() {
    for cut in 0..NESTED.len() {
        let (mut state, _, _) = nested_schema();
        feed(&mut state, &[&NESTED[..cut]]);
        let err = state.finalize().unwrap_err();
        assert!(err.is_missing_bytes(), "cut at {cut}: {err}");
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Drivers
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn test_decode_bytes_leaves_trailing_bytes() {
    let mut state = PrimitiveReadState::word();
    assert_eq!(decode_bytes(&mut state, &[0, 0, 0, 1, 0xFF, 0xFF]).unwrap(), 4);
}

#[test]
fn test_decode_from_reader_back_to_back_packets() {
    let mut input = ONE_TWO_THREE.to_vec();
    input.extend([0, 0, 0, 1, 0, 0, 0, 4]);
    let mut reader = BufReader::with_capacity(3, Cursor::new(input));

    let (mut state, values) = uint_array(10);
    assert_eq!(decode_from_reader(&mut state, &mut reader).unwrap(), 16);
    state.reset();
    assert_eq!(decode_from_reader(&mut state, &mut reader).unwrap(), 8);
    assert_eq!(*values.borrow(), [1, 2, 3, 4]);
}

#[test]
fn test_decode_from_reader_truncated() {
    let mut reader = Cursor::new(ONE_TWO_THREE[..10].to_vec());
    let (mut state, _) = uint_array(10);
    let err = decode_from_reader(&mut state, &mut reader).unwrap_err();
    assert!(err.is_missing_bytes());
}

#[test]
fn test_decode_state_dispatch_and_reset() {
    let mut state: DecodeState = PrimitiveReadState::hyper().into();
    assert_eq!(state.consume(&[0; 12]), (8, true));
    state.finalize().unwrap();
    state.reset();
    assert_eq!(state.consume(&[0; 3]), (3, false));
    assert!(state.finalize().is_err());
    assert!(format!("{state:?}").starts_with("Primitive("));
}

#[test]
fn test_collect_floats() {
    let singles = shared::<Vec<f32>>();
    let doubles = shared::<Vec<f64>>();
    let mut single = handlers::collect_float(singles.clone());
    let mut double = handlers::collect_double(doubles.clone());
    decode_bytes(&mut single, &0.25f32.to_be_bytes()).unwrap();
    decode_bytes(&mut double, &(-8.5f64).to_be_bytes()).unwrap();
    assert_eq!(*singles.borrow(), [0.25]);
    assert_eq!(*doubles.borrow(), [-8.5]);
}
