//! Type-erased values that flow through a pipe.
//!
//! A [`Data`] owns one value of any `'static` type together with the
//! [`TypeTag`] the registry dispatches on.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a concrete Rust type, with a short display name.
#[derive(Clone)]
pub struct TypeTag {
    id: TypeId,
    name: String,
}

impl TypeTag {
    /// Tag for `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Type name without module paths, e.g. `Vec<Value>`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Strip module paths from a `std::any::type_name` string.
fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    fn flush(segment: &mut String, out: &mut String) {
        let last = segment.rsplit("::").next().unwrap_or_default();
        out.push_str(last);
        segment.clear();
    }

    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            flush(&mut segment, &mut out);
            out.push(c);
        }
    }
    flush(&mut segment, &mut out);

    out
}

/// An owned, type-erased primary input or verb result.
pub struct Data {
    value: Box<dyn Any + Send + Sync>,
    tag: TypeTag,
}

impl Data {
    /// Wrap a value. Wrapping a `Data` returns it unchanged rather than nesting.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        match boxed.downcast::<Data>() {
            Ok(data) => *data,
            Err(value) => Self {
                value,
                tag: TypeTag::of::<T>(),
            },
        }
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn type_name(&self) -> &str {
        self.tag.name()
    }

    /// True if the wrapped value is exactly a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.tag.id() == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the wrapped value out, or get the `Data` back if it is not a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Data> {
        let tag = self.tag;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Data { value, tag }),
        }
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        &*self.value
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data<{}>", self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Frame(Vec<i64>);

    #[test]
    fn test_short_type_names() {
        assert_eq!(TypeTag::of::<i64>().name(), "i64");
        assert_eq!(TypeTag::of::<String>().name(), "String");
        assert_eq!(TypeTag::of::<Vec<serde_json::Value>>().name(), "Vec<Value>");
        assert_eq!(TypeTag::of::<Frame>().name(), "Frame");
        assert_eq!(
            TypeTag::of::<(i64, Option<String>)>().name(),
            "(i64, Option<String>)"
        );
    }

    #[test]
    fn test_tags_compare_by_type() {
        assert_eq!(TypeTag::of::<Frame>(), TypeTag::of::<Frame>());
        assert_ne!(TypeTag::of::<i64>(), TypeTag::of::<i32>());
    }

    #[test]
    fn test_downcast() {
        let data = Data::new(Frame(vec![1, 2]));
        assert!(data.is::<Frame>());
        assert!(!data.is::<i64>());
        assert_eq!(data.downcast_ref::<Frame>(), Some(&Frame(vec![1, 2])));

        let data = data.downcast::<i64>().unwrap_err();
        assert_eq!(data.type_name(), "Frame");
        assert_eq!(data.downcast::<Frame>().unwrap(), Frame(vec![1, 2]));
    }

    #[test]
    fn test_wrapping_data_does_not_nest() {
        let data = Data::new(Data::new(7i64));
        assert!(data.is::<i64>());
        assert_eq!(format!("{:?}", data), "Data<i64>");
    }
}
