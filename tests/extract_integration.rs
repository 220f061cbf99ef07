//! Integration tests for extract.
//!
//! Extract copies exactly what a walk reaches, under the original ids.

mod common;

use common::{add_noise, LAYOUTS};

use koda_store::bag::DataBag;
use koda_store::core::dtype::DType;
use koda_store::core::ids::{allocate_dicts, allocate_lists, allocate_objects};
use koda_store::core::item::{DataItem, DataSlice};
use koda_store::ops::traverser::TraverseOptions;
use koda_store::ops::ExtractOp;
use koda_store::schema::{DICT_KEYS_ATTR, DICT_VALUES_ATTR, LIST_ITEMS_ATTR, SCHEMA_ATTR};

fn int32() -> DataItem {
    DType::Int32.into()
}

#[test]
fn extract_copies_reachable_triples_only() {
    for layout in LAYOUTS {
        let mut bag = DataBag::new();
        let item_schema = bag.create_entity_schema(&[("x", int32())]).unwrap();
        let list_schema = bag.create_list_schema(item_schema.into()).unwrap();
        let root_schema = bag
            .create_entity_schema(&[("items", list_schema.into()), ("name", DType::Text.into())])
            .unwrap();
        let root = allocate_objects(1).object_by_offset(0);
        let list = allocate_lists(1).object_by_offset(0);
        let objs = allocate_objects(2);
        bag.set_attr(root, "name", "root".into()).unwrap();
        bag.set_attr(root, "items", list.into()).unwrap();
        bag.set_attr(root, "unreachable", 1i32.into()).unwrap();
        bag.extend_list(list, objs.ids().map(DataItem::from)).unwrap();
        for (i, obj) in objs.ids().enumerate() {
            bag.set_attr(obj, "x", (i as i32).into()).unwrap();
        }
        add_noise(&mut bag);
        let (main, fallback) = layout.split(bag);

        let mut out = DataBag::new();
        ExtractOp::new(&mut out)
            .extract_slice(
                &DataSlice::new(vec![root.into()]),
                &root_schema.into(),
                &main,
                &[&fallback],
            )
            .unwrap();

        let mut expected = DataBag::new();
        expected.set_attr(root, "name", "root".into()).unwrap();
        expected.set_attr(root, "items", list.into()).unwrap();
        expected.extend_list(list, objs.ids().map(DataItem::from)).unwrap();
        for (i, obj) in objs.ids().enumerate() {
            expected.set_attr(obj, "x", (i as i32).into()).unwrap();
        }
        expected.set_schema_attr(item_schema, "x", int32()).unwrap();
        expected
            .set_schema_attr(list_schema, LIST_ITEMS_ATTR, item_schema.into())
            .unwrap();
        expected
            .set_schema_attr(root_schema, "items", list_schema.into())
            .unwrap();
        expected
            .set_schema_attr(root_schema, "name", DType::Text.into())
            .unwrap();
        assert_eq!(out, expected, "layout {layout:?}");
    }
}

#[test]
fn extract_under_object_keeps_schema_attribute() {
    for layout in LAYOUTS {
        let mut bag = DataBag::new();
        let dict_schema = bag
            .create_dict_schema(DType::Text.into(), DType::Int64.into())
            .unwrap();
        let dict = allocate_dicts(1).object_by_offset(0);
        bag.set_in_dict(dict, "a".into(), 1i64.into()).unwrap();
        bag.set_attr(dict, SCHEMA_ATTR, dict_schema.into()).unwrap();
        add_noise(&mut bag);
        let (main, fallback) = layout.split(bag);

        let mut out = DataBag::new();
        ExtractOp::new(&mut out)
            .with_options(TraverseOptions::default())
            .extract_slice(
                &DataSlice::new(vec![dict.into(), 7i32.into()]),
                &DType::Object.into(),
                &main,
                &[&fallback],
            )
            .unwrap();

        let mut expected = DataBag::new();
        expected.set_in_dict(dict, "a".into(), 1i64.into()).unwrap();
        expected.set_attr(dict, SCHEMA_ATTR, dict_schema.into()).unwrap();
        expected
            .set_schema_attr(dict_schema, DICT_KEYS_ATTR, DType::Text.into())
            .unwrap();
        expected
            .set_schema_attr(dict_schema, DICT_VALUES_ATTR, DType::Int64.into())
            .unwrap();
        assert_eq!(out, expected, "layout {layout:?}");
    }
}

#[test]
fn main_bag_values_shadow_fallback() {
    let mut fallback = DataBag::new();
    let schema = fallback
        .create_entity_schema(&[("x", int32()), ("y", int32())])
        .unwrap();
    let obj = allocate_objects(1).object_by_offset(0);
    fallback.set_attr(obj, "x", 1i32.into()).unwrap();
    fallback.set_attr(obj, "y", 2i32.into()).unwrap();
    let mut main = DataBag::new();
    main.set_attr(obj, "x", 10i32.into()).unwrap();
    main.set_attr(obj, "y", DataItem::Missing).unwrap();

    let mut out = DataBag::new();
    ExtractOp::new(&mut out)
        .extract_slice(
            &DataSlice::new(vec![obj.into()]),
            &schema.into(),
            &main,
            &[&fallback],
        )
        .unwrap();

    assert_eq!(out.get_attr(obj, "x"), 10i32.into());
    assert_eq!(out.get_attr(obj, "y"), DataItem::Missing);
    assert_eq!(out.attr_names(obj), vec!["x".to_string()]);
}
