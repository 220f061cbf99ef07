//! ops::traverser
//!
//! Cycle-safe two-phase walk of the object graph.
//!
//! # Phases
//!
//! Every reachable object is first *previsited* when it is discovered and
//! later *visited* once all of its children have been processed. A visitor
//! that assigns new identities registers them during previsit, so by the
//! time any object's content is emitted every reference in it resolves,
//! including forward and self references.
//!
//! # Walk
//!
//! The walk is an iterative post-order DFS over an explicit stack. Each
//! object id is previsited and visited once per call. Before walking, a
//! reachability pass collects the ids that some path reaches under OBJECT;
//! such an id is always discovered dynamically, even when a declared
//! schema reaches it first, so its OBJECT previsit precedes its
//! schema-qualified one.
//!
//! | Item | Schema | Handling |
//! |---|---|---|
//! | not an id | any | leaf |
//! | id | ITEMID, NONE, primitive, nofollow | leaf |
//! | id | ANY | unsupported |
//! | schema id | SCHEMA or OBJECT | schema record |
//! | id | OBJECT | own `__schema__`, then content |
//! | id reached under OBJECT elsewhere | entity schema | as under OBJECT |
//! | id | entity schema | content per schema |

use std::collections::HashSet;

use crate::bag::BagView;
use crate::core::config::{AttributeOrder, EngineConfig};
use crate::core::dtype::DType;
use crate::core::errors::{Error, Result};
use crate::core::ids::ObjectId;
use crate::core::item::{DataItem, DataSlice};
use crate::schema::{DICT_KEYS_ATTR, DICT_VALUES_ATTR, LIST_ITEMS_ATTR, SCHEMA_ATTR};

/// Callbacks driven by a [`Traverser`].
///
/// Children arrive at `visit_*` already passed through
/// [`get_value`](Visitor::get_value).
pub trait Visitor {
    /// Called once per object id when it is discovered, before any of its
    /// children. Called for every occurrence of leaves.
    fn previsit(&mut self, item: &DataItem, schema: &DataItem) -> Result<()>;

    /// Project a source item into the visitor's output space.
    fn get_value(&self, item: &DataItem, schema: &DataItem) -> Result<DataItem>;

    fn visit_list(
        &mut self,
        list: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        items: &[DataItem],
    ) -> Result<()>;

    fn visit_dict(
        &mut self,
        dict: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        keys: &[DataItem],
        values: &[DataItem],
    ) -> Result<()>;

    /// Emit an entity. `attr_values` may hold missing values.
    fn visit_object(
        &mut self,
        object: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        attr_names: &[String],
        attr_values: &[DataItem],
    ) -> Result<()>;

    /// Emit a schema record. Defaults to [`visit_object`](Visitor::visit_object).
    fn visit_schema(
        &mut self,
        item: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        attr_names: &[String],
        attr_schemas: &[DataItem],
    ) -> Result<()> {
        self.visit_object(item, schema, is_object_schema, attr_names, attr_schemas)
    }

    fn visit_primitive(&mut self, _item: &DataItem, _schema: &DataItem) -> Result<()> {
        Ok(())
    }
}

/// Traversal knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraverseOptions {
    pub attribute_order: AttributeOrder,
    /// Emit a `trace` event for every previsit and visit.
    pub trace_visits: bool,
}

impl TraverseOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            attribute_order: config.attribute_order(),
            trace_visits: config.trace_visits(),
        }
    }
}

/// Children of an object, each with the schema it is walked under.
#[derive(Debug)]
enum Content {
    List {
        items: Vec<DataItem>,
        item_schema: DataItem,
    },
    Dict {
        keys: Vec<DataItem>,
        values: Vec<DataItem>,
        key_schema: DataItem,
        value_schema: DataItem,
    },
    Object {
        names: Vec<String>,
        values: Vec<DataItem>,
        schemas: Vec<DataItem>,
    },
    Schema {
        names: Vec<String>,
        values: Vec<DataItem>,
    },
}

impl Content {
    fn children(&self) -> Vec<(DataItem, DataItem)> {
        match self {
            Content::List { items, item_schema } => items
                .iter()
                .map(|item| (item.clone(), item_schema.clone()))
                .collect(),
            Content::Dict {
                keys,
                values,
                key_schema,
                value_schema,
            } => keys
                .iter()
                .map(|k| (k.clone(), key_schema.clone()))
                .chain(values.iter().map(|v| (v.clone(), value_schema.clone())))
                .collect(),
            Content::Object {
                values, schemas, ..
            } => values.iter().cloned().zip(schemas.iter().cloned()).collect(),
            Content::Schema { values, .. } => values
                .iter()
                .map(|v| (v.clone(), DType::Schema.into()))
                .collect(),
        }
    }
}

#[derive(Debug)]
struct Emission {
    id: ObjectId,
    schema: DataItem,
    is_object_schema: bool,
    content: Content,
}

#[derive(Debug)]
enum Frame {
    Discover { item: DataItem, schema: DataItem },
    Emit(Emission),
}

/// Walks slices of a bag view, driving a [`Visitor`].
///
/// # Example
///
/// ```
/// use koda_store::bag::DataBag;
/// use koda_store::core::dtype::DType;
/// use koda_store::core::errors::Result;
/// use koda_store::core::ids::{allocate_objects, ObjectId};
/// use koda_store::core::item::{DataItem, DataSlice};
/// use koda_store::ops::traverser::{Traverser, Visitor};
///
/// #[derive(Default)]
/// struct CountObjects(usize);
///
/// impl Visitor for CountObjects {
///     fn previsit(&mut self, _: &DataItem, _: &DataItem) -> Result<()> {
///         Ok(())
///     }
///     fn get_value(&self, item: &DataItem, _: &DataItem) -> Result<DataItem> {
///         Ok(item.clone())
///     }
///     fn visit_list(&mut self, _: ObjectId, _: &DataItem, _: bool, _: &[DataItem]) -> Result<()> {
///         Ok(())
///     }
///     fn visit_dict(
///         &mut self,
///         _: ObjectId,
///         _: &DataItem,
///         _: bool,
///         _: &[DataItem],
///         _: &[DataItem],
///     ) -> Result<()> {
///         Ok(())
///     }
///     fn visit_object(
///         &mut self,
///         _: ObjectId,
///         _: &DataItem,
///         _: bool,
///         _: &[String],
///         _: &[DataItem],
///     ) -> Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// let mut bag = DataBag::new();
/// let schema = bag.create_entity_schema(&[("x", DType::Int32.into())]).unwrap();
/// let objs = allocate_objects(2);
/// bag.set_attr(objs.object_by_offset(0), "x", 1i32.into()).unwrap();
///
/// let mut counter = CountObjects::default();
/// Traverser::new(bag.view(&[]), &mut counter)
///     .traverse_slice(&DataSlice::objects_from_allocation(objs, 2), &schema.into())
///     .unwrap();
/// // Two entities plus the schema record itself.
/// assert_eq!(counter.0, 3);
/// ```
pub struct Traverser<'a, 'v, V: Visitor> {
    view: BagView<'a>,
    visitor: &'v mut V,
    options: TraverseOptions,
    visited: HashSet<ObjectId>,
    dynamic: HashSet<ObjectId>,
    /// Ids some path reaches under OBJECT.
    reached_dynamically: HashSet<ObjectId>,
}

impl<'a, 'v, V: Visitor> Traverser<'a, 'v, V> {
    pub fn new(view: BagView<'a>, visitor: &'v mut V) -> Self {
        Self {
            view,
            visitor,
            options: TraverseOptions::default(),
            visited: HashSet::new(),
            dynamic: HashSet::new(),
            reached_dynamically: HashSet::new(),
        }
    }

    pub fn with_options(mut self, options: TraverseOptions) -> Self {
        self.options = options;
        self
    }

    /// Walk every item of `slice` under `schema`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if `schema` is not a schema item,
    /// and any error raised by the walk or the visitor. The first error
    /// aborts the traversal.
    pub fn traverse_slice(&mut self, slice: &DataSlice, schema: &DataItem) -> Result<()> {
        if !schema.is_schema() {
            return Err(Error::invalid(format!(
                "schema must be a schema item, got: {schema}"
            )));
        }
        self.visited.clear();
        self.dynamic.clear();
        self.reached_dynamically = self.find_dynamic(slice, schema);
        tracing::debug!(items = slice.len(), schema = %schema, "traversal started");

        if let Some(id) = schema.as_object_id().filter(|id| !id.is_nofollow_schema()) {
            self.walk(id.into(), DType::Schema.into())?;
        }
        for item in slice {
            self.walk(item.clone(), schema.clone())?;
        }

        tracing::debug!(
            objects = self.visited.len(),
            dynamic = self.dynamic.len(),
            "traversal finished"
        );
        Ok(())
    }

    /// Walk a single item under `schema`.
    pub fn traverse_item(&mut self, item: &DataItem, schema: &DataItem) -> Result<()> {
        self.traverse_slice(&DataSlice::new(vec![item.clone()]), schema)
    }

    fn walk(&mut self, item: DataItem, schema: DataItem) -> Result<()> {
        let mut stack = vec![Frame::Discover { item, schema }];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Discover { item, schema } => self.discover(item, schema, &mut stack)?,
                Frame::Emit(emission) => self.emit(emission)?,
            }
        }
        Ok(())
    }

    fn previsit(&mut self, item: &DataItem, schema: &DataItem) -> Result<()> {
        if self.options.trace_visits {
            tracing::trace!(item = %item, schema = %schema, "previsit");
        }
        self.visitor.previsit(item, schema)
    }

    fn leaf(&mut self, item: &DataItem, schema: &DataItem) -> Result<()> {
        self.previsit(item, schema)?;
        self.visitor.visit_primitive(item, schema)
    }

    fn discover(&mut self, item: DataItem, schema: DataItem, stack: &mut Vec<Frame>) -> Result<()> {
        let Some(id) = item.as_object_id() else {
            return self.leaf(&item, &schema);
        };
        match &schema {
            DataItem::DType(DType::Any) => {
                self.previsit(&item, &schema)?;
                Err(Error::UnsupportedSchema {
                    schema: schema.clone(),
                    item: item.clone(),
                })
            }
            DataItem::DType(DType::Schema) => self.discover_schema(id, stack),
            DataItem::DType(DType::Object) if id.is_schema() => self.discover_schema(id, stack),
            DataItem::DType(DType::Object) => self.discover_dynamic(id, stack),
            DataItem::DType(_) => self.leaf(&item, &schema),
            DataItem::ObjectId(s) if s.is_nofollow_schema() => self.leaf(&item, &schema),
            DataItem::ObjectId(s) if s.is_schema() => {
                if id.is_schema() {
                    return Err(Error::invalid(format!(
                        "schema {id} cannot be walked under entity schema {s}"
                    )));
                }
                if self.reached_dynamically.contains(&id) {
                    return self.discover_dynamic(id, stack);
                }
                if !self.visited.insert(id) {
                    return Ok(());
                }
                self.previsit(&item, &schema)?;
                let content = self.read_content(id, *s)?;
                Self::schedule(stack, id, schema.clone(), false, content);
                Ok(())
            }
            _ => Err(Error::invalid(format!(
                "schema must be a schema item, got: {schema}"
            ))),
        }
    }

    fn discover_schema(&mut self, id: ObjectId, stack: &mut Vec<Frame>) -> Result<()> {
        let item = DataItem::from(id);
        let schema = DataItem::from(DType::Schema);
        if !id.is_schema() {
            return Err(Error::invalid(format!(
                "expected a schema under SCHEMA, got: {id}"
            )));
        }
        if id.is_nofollow_schema() {
            return self.leaf(&item, &schema);
        }
        if !self.visited.insert(id) {
            return Ok(());
        }
        self.previsit(&item, &schema)?;

        let names = self.ordered_names(id);
        let values: Vec<DataItem> = names
            .iter()
            .map(|name| self.view.get_schema_attr(id, name))
            .collect();
        let children: Vec<DataItem> = values.clone();
        stack.push(Frame::Emit(Emission {
            id,
            schema,
            is_object_schema: false,
            content: Content::Schema { names, values },
        }));
        for item in children.into_iter().rev() {
            stack.push(Frame::Discover {
                item,
                schema: DType::Schema.into(),
            });
        }
        Ok(())
    }

    fn discover_dynamic(&mut self, id: ObjectId, stack: &mut Vec<Frame>) -> Result<()> {
        if !self.dynamic.insert(id) {
            return Ok(());
        }
        let item = DataItem::from(id);
        self.previsit(&item, &DType::Object.into())?;

        let own_schema = self.object_schema(id)?;
        self.visited.insert(id);
        self.previsit(&item, &own_schema.into())?;
        let content = self.read_content(id, own_schema)?;
        Self::schedule(stack, id, own_schema.into(), true, content);
        Ok(())
    }

    /// The entity schema stored in `id`'s own `__schema__`.
    fn object_schema(&self, id: ObjectId) -> Result<ObjectId> {
        match self.view.get_attr(id, SCHEMA_ATTR) {
            DataItem::Missing => Err(Error::MissingObjectSchema { object: id }),
            DataItem::ObjectId(s) if s.is_schema() && !s.is_nofollow_schema() => Ok(s),
            other => Err(Error::invalid(format!(
                "{SCHEMA_ATTR} of {id} must be an entity schema, got: {other}"
            ))),
        }
    }

    /// Ids reachable under OBJECT from `slice`.
    ///
    /// Contents are followed under every schema an id is reached with, so
    /// the result covers whichever schema the walk itself settles on. Items
    /// that would fail the walk are skipped here and reported by it.
    fn find_dynamic(&self, slice: &DataSlice, schema: &DataItem) -> HashSet<ObjectId> {
        let mut found = HashSet::new();
        let mut seen: HashSet<(ObjectId, DataItem)> = HashSet::new();
        let mut pending: Vec<(DataItem, DataItem)> = slice
            .iter()
            .map(|item| (item.clone(), schema.clone()))
            .collect();
        while let Some((item, schema)) = pending.pop() {
            let Some(id) = item.as_object_id() else {
                continue;
            };
            // Schema records hold only schemas, which never lead back to data.
            if id.is_schema() {
                continue;
            }
            let walk_under = match &schema {
                DataItem::DType(DType::Object) => match self.object_schema(id) {
                    Ok(own) => {
                        found.insert(id);
                        own
                    }
                    Err(_) => continue,
                },
                DataItem::ObjectId(s) if s.is_schema() && !s.is_nofollow_schema() => *s,
                _ => continue,
            };
            if !seen.insert((id, schema)) {
                continue;
            }
            if let Ok(content) = self.read_content(id, walk_under) {
                pending.extend(content.children());
            }
        }
        found
    }

    /// Push the emission of `id`, then its schema record and content children
    /// so that they are processed first.
    fn schedule(
        stack: &mut Vec<Frame>,
        id: ObjectId,
        schema: DataItem,
        is_object_schema: bool,
        content: Content,
    ) {
        let children = content.children();
        let schema_record = schema.clone();
        stack.push(Frame::Emit(Emission {
            id,
            schema,
            is_object_schema,
            content,
        }));
        for (item, schema) in children.into_iter().rev() {
            stack.push(Frame::Discover { item, schema });
        }
        stack.push(Frame::Discover {
            item: schema_record,
            schema: DType::Schema.into(),
        });
    }

    fn required_schema_attr(&self, schema: ObjectId, attr: &str) -> Result<DataItem> {
        match self.view.get_schema_attr(schema, attr) {
            DataItem::Missing => Err(Error::MissingSchemaAttribute {
                schema,
                attr: attr.to_string(),
            }),
            value => Ok(value),
        }
    }

    fn read_content(&self, id: ObjectId, schema: ObjectId) -> Result<Content> {
        if id.is_list() {
            let item_schema = self.required_schema_attr(schema, LIST_ITEMS_ATTR)?;
            return Ok(Content::List {
                items: self.view.list_items(id).to_vec(),
                item_schema,
            });
        }
        if id.is_dict() {
            let key_schema = self.required_schema_attr(schema, DICT_KEYS_ATTR)?;
            let value_schema = self.required_schema_attr(schema, DICT_VALUES_ATTR)?;
            let keys = self.view.dict_keys(id);
            let values = keys
                .iter()
                .map(|key| self.view.get_from_dict(id, key))
                .collect();
            return Ok(Content::Dict {
                keys,
                values,
                key_schema,
                value_schema,
            });
        }

        let names = self.ordered_names(schema);
        let schemas = names
            .iter()
            .map(|name| self.view.get_schema_attr(schema, name))
            .collect();
        let values = names
            .iter()
            .map(|name| self.view.get_attr(id, name))
            .collect();
        Ok(Content::Object {
            names,
            values,
            schemas,
        })
    }

    fn ordered_names(&self, schema: ObjectId) -> Vec<String> {
        let mut names = self.view.schema_attr_names(schema);
        if self.options.attribute_order == AttributeOrder::Sorted {
            names.sort();
        }
        names
    }

    fn map_values(&self, items: &[DataItem], schema: &DataItem) -> Result<Vec<DataItem>> {
        items
            .iter()
            .map(|item| self.visitor.get_value(item, schema))
            .collect()
    }

    fn emit(&mut self, emission: Emission) -> Result<()> {
        let Emission {
            id,
            schema,
            is_object_schema,
            content,
        } = emission;
        if self.options.trace_visits {
            tracing::trace!(item = %id, schema = %schema, is_object_schema, "visit");
        }
        match content {
            Content::List { items, item_schema } => {
                let items = self.map_values(&items, &item_schema)?;
                self.visitor
                    .visit_list(id, &schema, is_object_schema, &items)
            }
            Content::Dict {
                keys,
                values,
                key_schema,
                value_schema,
            } => {
                let keys = self.map_values(&keys, &key_schema)?;
                let values = self.map_values(&values, &value_schema)?;
                self.visitor
                    .visit_dict(id, &schema, is_object_schema, &keys, &values)
            }
            Content::Object {
                names,
                values,
                schemas,
            } => {
                let values = values
                    .iter()
                    .zip(&schemas)
                    .map(|(value, schema)| self.visitor.get_value(value, schema))
                    .collect::<Result<Vec<_>>>()?;
                self.visitor
                    .visit_object(id, &schema, is_object_schema, &names, &values)
            }
            Content::Schema { names, values } => {
                let values = self.map_values(&values, &DType::Schema.into())?;
                self.visitor
                    .visit_schema(id, &schema, is_object_schema, &names, &values)
            }
        }
    }
}
