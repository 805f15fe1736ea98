//! Build-then-read behaviour of Win64 variadic lists.

use offheap_core::{ErrorKind, MemoryAddress, MemoryLayout, Region, ResourceScope};
use offheap_valist::win64::{C_CHAR, C_DOUBLE, C_INT, C_LONG_LONG, C_POINTER, C_SHORT};
use offheap_valist::{TypeClass, VaAbi, VaList, Win64};

type List = VaList<Win64>;

fn struct_of(members: Vec<MemoryLayout>) -> MemoryLayout {
    MemoryLayout::structure(members).unwrap()
}

fn patterned(scope: &ResourceScope, len: u64) -> Region {
    let region = scope.allocate_native(len, 8).unwrap();
    let bytes: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(7)).collect();
    region.write_bytes(0, &bytes).unwrap();
    region
}

#[test]
fn int_long_address_round_trip() {
    let scope = ResourceScope::confined();
    let mut list = List::make(&scope, |b| {
        b.varg_from_int(&C_INT, 7)?
            .varg_from_long(&C_LONG_LONG, 99)?
            .varg_from_address(&C_POINTER, MemoryAddress(0x1000))?;
        Ok(())
    })
    .unwrap();

    assert_eq!(list.varg_as_int(&C_INT).unwrap(), 7);
    assert_eq!(list.varg_as_long(&C_LONG_LONG).unwrap(), 99);
    assert_eq!(list.varg_as_address(&C_POINTER).unwrap(), MemoryAddress(0x1000));
    assert_eq!(list.position(), 3 * Win64::SLOT_SIZE);
}

#[test]
fn by_reference_struct_round_trips_byte_for_byte() {
    let scope = ResourceScope::confined();
    let layout = struct_of(vec![C_LONG_LONG, C_INT, C_SHORT, C_CHAR, C_CHAR]);
    assert_eq!(layout.byte_size(), 16);
    assert_eq!(
        Win64::classify(offheap_core::Carrier::Segment, &layout),
        TypeClass::StructReference
    );
    let original = patterned(&scope, 16);

    let mut list = List::make(&scope, |b| {
        b.varg_from_int(&C_INT, 1)?
            .varg_from_segment(&layout, &original)?
            .varg_from_int(&C_INT, 2)?;
        Ok(())
    })
    .unwrap();

    assert_eq!(list.varg_as_int(&C_INT).unwrap(), 1);
    let copy = list.varg_as_segment_in(&layout, &scope).unwrap();
    assert_ne!(copy.address(), original.address());
    assert_eq!(copy.to_vec().unwrap(), original.to_vec().unwrap());
    assert_eq!(list.varg_as_int(&C_INT).unwrap(), 2);
}

#[test]
fn in_register_struct_round_trips_byte_for_byte() {
    let scope = ResourceScope::confined();
    for layout in [
        struct_of(vec![C_CHAR]),
        struct_of(vec![C_CHAR, C_CHAR]),
        struct_of(vec![C_SHORT, C_SHORT]),
        struct_of(vec![C_INT, C_INT]),
        struct_of(vec![C_DOUBLE]),
    ] {
        assert_eq!(
            Win64::classify(offheap_core::Carrier::Segment, &layout),
            TypeClass::StructRegister
        );
        let original = patterned(&scope, layout.byte_size());
        let mut list = List::make(&scope, |b| b.varg_from_segment(&layout, &original).map(drop)).unwrap();
        let copy = list.varg_as_segment_in(&layout, &scope).unwrap();
        assert_eq!(copy.to_vec().unwrap(), original.to_vec().unwrap());
        assert_eq!(list.position(), Win64::SLOT_SIZE);
    }
}

#[test]
fn mixed_structs_keep_their_slots() {
    let scope = ResourceScope::shared();
    let small = struct_of(vec![C_INT]);
    let large = struct_of(vec![C_DOUBLE, C_DOUBLE, C_DOUBLE]);
    let a = patterned(&scope, 4);
    let b = patterned(&scope, 24);

    let mut list = List::make(&scope, |builder| {
        builder
            .varg_from_segment(&large, &b)?
            .varg_from_segment(&small, &a)?
            .varg_from_double(&C_DOUBLE, -0.5)?;
        Ok(())
    })
    .unwrap();

    let mut copy = list.copy().unwrap();
    assert_eq!(list.varg_as_segment_in(&large, &scope).unwrap().to_vec().unwrap(), b.to_vec().unwrap());
    assert_eq!(list.varg_as_segment_in(&small, &scope).unwrap().to_vec().unwrap(), a.to_vec().unwrap());
    assert_eq!(list.varg_as_double(&C_DOUBLE).unwrap(), -0.5);

    copy.skip(&[large, small]).unwrap();
    assert_eq!(copy.varg_as_double(&C_DOUBLE).unwrap(), -0.5);
}

#[test]
fn closing_the_scope_invalidates_the_list() {
    let scope = ResourceScope::confined();
    let mut list = List::make(&scope, |b| b.varg_from_int(&C_INT, 5).map(drop)).unwrap();
    scope.close().unwrap();
    assert_eq!(list.varg_as_int(&C_INT).unwrap_err().kind(), ErrorKind::Liveness);
    assert_eq!(list.copy().unwrap_err().kind(), ErrorKind::Liveness);
    assert_eq!(scope.close().unwrap_err().kind(), ErrorKind::Liveness);
}

#[test]
fn empty_build_is_the_empty_list() {
    let scope = ResourceScope::confined();
    let list = List::make(&scope, |_| Ok(())).unwrap();
    assert!(list.is_empty_list());
    assert!(list.address().is_null());
}

#[test]
fn shared_list_reads_from_another_thread() {
    let scope = ResourceScope::shared();
    let mut list = List::make(&scope, |b| {
        b.varg_from_long(&C_LONG_LONG, i64::MIN)?.varg_from_double(&C_DOUBLE, 1.25)?;
        Ok(())
    })
    .unwrap();
    let (long, double) = std::thread::spawn(move || {
        let long = list.varg_as_long(&C_LONG_LONG).unwrap();
        let double = list.varg_as_double(&C_DOUBLE).unwrap();
        (long, double)
    })
    .join()
    .unwrap();
    assert_eq!(long, i64::MIN);
    assert_eq!(double, 1.25);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Debug)]
    enum Arg {
        Int(i32),
        Long(i64),
        Double(f64),
        Address(u64),
    }

    fn arg() -> impl Strategy<Value = Arg> {
        prop_oneof![
            any::<i32>().prop_map(Arg::Int),
            any::<i64>().prop_map(Arg::Long),
            (-1.0e12f64..1.0e12).prop_map(Arg::Double),
            any::<u64>().prop_map(Arg::Address),
        ]
    }

    proptest! {
        #[test]
        fn arbitrary_sequences_read_back_in_order(args in prop::collection::vec(arg(), 0..32)) {
            let scope = ResourceScope::confined();
            let mut list = List::make(&scope, |b| {
                for arg in &args {
                    match *arg {
                        Arg::Int(v) => b.varg_from_int(&C_INT, v)?,
                        Arg::Long(v) => b.varg_from_long(&C_LONG_LONG, v)?,
                        Arg::Double(v) => b.varg_from_double(&C_DOUBLE, v)?,
                        Arg::Address(v) => b.varg_from_address(&C_POINTER, MemoryAddress(v))?,
                    };
                }
                Ok(())
            })
            .unwrap();

            for arg in &args {
                match *arg {
                    Arg::Int(v) => {
                        prop_assert_eq!(list.varg_as_int(&C_INT).unwrap(), v);
                    }
                    Arg::Long(v) => {
                        prop_assert_eq!(list.varg_as_long(&C_LONG_LONG).unwrap(), v);
                    }
                    Arg::Double(v) => {
                        prop_assert_eq!(list.varg_as_double(&C_DOUBLE).unwrap(), v);
                    }
                    Arg::Address(v) => {
                        prop_assert_eq!(list.varg_as_address(&C_POINTER).unwrap(), MemoryAddress(v));
                    }
                }
            }
            prop_assert_eq!(list.position(), args.len() as u64 * Win64::SLOT_SIZE);
        }
    }
}
