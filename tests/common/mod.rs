//! Shared fixtures for integration tests.

#![allow(dead_code)]

use koda_store::bag::DataBag;
use koda_store::core::dtype::DType;
use koda_store::core::ids::{allocate_dicts, allocate_lists, allocate_objects};
use koda_store::core::item::DataItem;

/// Where the source triples live when an operation reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// All triples in the main bag, empty fallback.
    Main,
    /// Empty main bag, all triples in the fallback.
    Fallback,
}

pub const LAYOUTS: [Layout; 2] = [Layout::Main, Layout::Fallback];

impl Layout {
    /// Split a populated bag into (main, fallback) for this layout.
    pub fn split(self, bag: DataBag) -> (DataBag, DataBag) {
        match self {
            Layout::Main => (bag, DataBag::new()),
            Layout::Fallback => (DataBag::new(), bag),
        }
    }
}

/// Add triples that nothing in a test slice can reach.
pub fn add_noise(bag: &mut DataBag) {
    let noise_schema = bag
        .create_entity_schema(&[
            ("x", DType::Int32.into()),
            ("name", DType::Text.into()),
        ])
        .unwrap();
    let objs = allocate_objects(5);
    for (i, obj) in objs.ids().enumerate() {
        bag.set_attr(obj, "x", (i as i32).into()).unwrap();
        bag.set_attr(obj, "name", format!("noise{i}").into()).unwrap();
        bag.set_attr(obj, "__schema__", noise_schema.into()).unwrap();
    }
    let list = allocate_lists(1).object_by_offset(0);
    bag.extend_list(list, vec![1i32.into(), 2i32.into()]).unwrap();
    let dict = allocate_dicts(1).object_by_offset(0);
    bag.set_in_dict(dict, "k".into(), DataItem::from(1i64)).unwrap();
}
