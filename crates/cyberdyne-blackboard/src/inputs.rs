use std::any::Any;

use crate::attr::{Attr, AttrId};
use crate::error::InputError;
use crate::schema::Schema;
use crate::slot::Erased;

/// Current upstream values handed to a derived field's compute function.
///
/// Values appear in the order the dependencies were declared. Each can be
/// borrowed by position, by typed key, or by name.
pub struct Inputs<'a> {
    schema: &'a Schema,
    field: AttrId,
    deps: &'a [AttrId],
    values: &'a [Erased],
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(
        schema: &'a Schema,
        field: AttrId,
        deps: &'a [AttrId],
        values: &'a [Erased],
    ) -> Self {
        debug_assert_eq!(deps.len(), values.len());
        Self {
            schema,
            field,
            deps,
            values,
        }
    }

    /// Name of the attribute being computed.
    #[must_use]
    pub fn field(&self) -> &'a str {
        self.schema.attr_name(self.field).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Name of the input at `index`.
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&'a str> {
        self.deps
            .get(index)
            .and_then(|id| self.schema.attr_name(*id))
    }

    /// Borrow the input at `index`.
    pub fn at<T: 'static>(&self, index: usize) -> Result<&T, InputError> {
        let value: &dyn Any = &**self.values.get(index).ok_or(InputError::OutOfRange {
            index,
            len: self.values.len(),
        })?;
        value.downcast_ref::<T>().ok_or_else(|| {
            let id = self.deps[index];
            InputError::TypeMismatch {
                name: self.name(index).unwrap_or_default().to_owned(),
                expected: std::any::type_name::<T>(),
                found: self
                    .schema
                    .value_type(id)
                    .map_or("<unknown>", |ty| ty.name()),
            }
        })
    }

    /// Borrow the input read through `attr`.
    pub fn get<T: 'static>(&self, attr: &Attr<T>) -> Result<&T, InputError> {
        let position = (attr.schema() == self.schema.id())
            .then(|| self.deps.iter().position(|id| *id == attr.id()))
            .flatten();
        match position {
            Some(index) => self.at(index),
            None => Err(InputError::NotAnInput {
                name: self
                    .schema
                    .attr_name(attr.id())
                    .filter(|_| attr.schema() == self.schema.id())
                    .unwrap_or("<foreign key>")
                    .to_owned(),
            }),
        }
    }

    /// Borrow the input named `name`.
    pub fn named<T: 'static>(&self, name: &str) -> Result<&T, InputError> {
        let index = (0..self.deps.len())
            .find(|&i| self.name(i) == Some(name))
            .ok_or_else(|| InputError::NotAnInput {
                name: name.to_owned(),
            })?;
        self.at(index)
    }
}

impl std::fmt::Debug for Inputs<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = (0..self.deps.len())
            .filter_map(|i| self.name(i))
            .collect();
        f.debug_struct("Inputs")
            .field("field", &self.field())
            .field("inputs", &names)
            .finish()
    }
}
