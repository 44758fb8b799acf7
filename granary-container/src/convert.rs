//! Value conversion at injection points.
//!
//! The container never guesses at user types: a [`TypeConverter`] turns a
//! resolved [`Value`] into the shape a [`ParamType`] asks for, or fails with
//! [`ContainerError::Conversion`]. [`SimpleTypeConverter`] covers literal
//! parsing, numeric widening, bean assignability and element-wise
//! collections; a custom converter can be installed on the builder.

use std::fmt;

use tracing::trace;

use crate::error::{ContainerError, Result};
use crate::value::{ParamType, Value};

/// Weight of a parameter list that does not accept the arguments at all.
pub(crate) const UNASSIGNABLE: i64 = i32::MAX as i64;

/// Converts resolved values to the type an injection point declares.
pub trait TypeConverter: Send + Sync {
    /// `context` names the injection point for error messages,
    /// e.g. `constructor parameter 1 (timeout)`.
    fn convert(&self, value: Value, target: &ParamType, context: &str) -> Result<Value>;
}

/// Literal parsing, numeric widening and bean assignability.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTypeConverter;

impl SimpleTypeConverter {
    pub fn new() -> Self {
        Self
    }

    fn fail(value: &Value, target: &ParamType, reason: impl fmt::Display) -> ContainerError {
        ContainerError::Conversion {
            from: value.type_description(),
            to: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl TypeConverter for SimpleTypeConverter {
    fn convert(&self, value: Value, target: &ParamType, context: &str) -> Result<Value> {
        if value.is_null() || is_assignable(target, &value) {
            return Ok(value);
        }
        trace!(context, from = %value.type_description(), to = %target, "Converting value");

        match (target, value) {
            (ParamType::Int, Value::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| Self::fail(&Value::Str(s.clone()), target, format_args!("{context}: {e}"))),
            (ParamType::Float, Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| Self::fail(&Value::Str(s.clone()), target, format_args!("{context}: {e}"))),
            (ParamType::Bool, Value::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(Self::fail(
                    &Value::Str(s.clone()),
                    target,
                    format_args!("{context}: invalid boolean value '{s}'"),
                )),
            },
            (ParamType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (ParamType::Str, Value::Int(i)) => Ok(Value::Str(i.to_string())),
            (ParamType::Str, Value::Float(x)) => Ok(Value::Str(x.to_string())),
            (ParamType::Str, Value::Bool(b)) => Ok(Value::Str(b.to_string())),
            (ParamType::List(_), bean @ Value::Bean(_)) => {
                let element = self.convert(bean, &element_type(target), context)?;
                Ok(Value::List(vec![element]))
            }
            (ParamType::List(_), Value::List(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| self.convert(item, &element_type(target), &format!("{context}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            (ParamType::Map(_), Value::Map(entries)) => entries
                .into_iter()
                .map(|(k, v)| {
                    let converted = self.convert(v, &element_type(target), &format!("{context}[{k}]"))?;
                    Ok((k, converted))
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),
            (_, other) => Err(Self::fail(&other, target, format_args!("{context}: no matching conversion"))),
        }
    }
}

fn element_type(target: &ParamType) -> ParamType {
    match target.element() {
        Some(key) => ParamType::Bean(key),
        None => *target,
    }
}

/// Returns `true` if `value` can be handed to `ty` without conversion.
/// `Null` is assignable to every non-simple type.
pub fn is_assignable(ty: &ParamType, value: &Value) -> bool {
    match (ty, value) {
        (t, Value::Null) => !t.is_simple(),
        (ParamType::Str, Value::Str(_))
        | (ParamType::Int, Value::Int(_))
        | (ParamType::Float, Value::Float(_))
        | (ParamType::Bool, Value::Bool(_)) => true,
        (ParamType::Bean(key), Value::Bean(bean)) => bean.is_assignable_to(key),
        (ParamType::List(key), Value::List(items)) => items
            .iter()
            .all(|v| is_assignable(&ParamType::Bean(*key), v)),
        (ParamType::Map(key), Value::Map(entries)) => entries
            .iter()
            .all(|(_, v)| is_assignable(&ParamType::Bean(*key), v)),
        (ParamType::Provider(key), Value::Provider(p)) => p.required_type() == *key,
        _ => false,
    }
}

fn value_weight(ty: &ParamType, value: &Value) -> Option<i64> {
    if !is_assignable(ty, value) {
        return None;
    }
    let weight = match (ty, value) {
        (ParamType::Bean(key), Value::Bean(bean)) => bean
            .class()
            .relation_to(key)
            .map_or(0, |relation| i64::from(relation.weight())),
        (ParamType::List(key), Value::List(items)) => items
            .iter()
            .filter_map(|v| value_weight(&ParamType::Bean(*key), v))
            .max()
            .unwrap_or(0),
        (ParamType::Map(key), Value::Map(entries)) => entries
            .iter()
            .filter_map(|(_, v)| value_weight(&ParamType::Bean(*key), v))
            .max()
            .unwrap_or(0),
        _ => 0,
    };
    Some(weight)
}

/// Cost of passing `values` to parameters of `types`.
///
/// An exact type match costs nothing, an interface view costs 1 and a
/// supertype view 2 per level; any unassignable argument makes the whole
/// list cost [`UNASSIGNABLE`]. Lower is better.
pub fn type_difference_weight(types: &[ParamType], values: &[Value]) -> i64 {
    if types.len() != values.len() {
        return UNASSIGNABLE;
    }
    let mut total = 0i64;
    for (ty, value) in types.iter().zip(values) {
        match value_weight(ty, value) {
            Some(weight) => total += weight,
            None => return UNASSIGNABLE,
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{Bean, BeanClass};
    use crate::key::TypeKey;
    use std::sync::Arc;

    trait Greeter: Send + Sync {}
    struct Base;
    struct English;
    impl Greeter for English {}

    fn english() -> Bean {
        let class = BeanClass::builder::<English>()
            .implements::<dyn Greeter>(|e| e)
            .extends::<Base>(2, |_| Arc::new(Base))
            .build();
        Bean::new(Arc::new(English), class)
    }

    #[test]
    fn parses_literals() {
        let c = SimpleTypeConverter::new();
        assert_eq!(c.convert(Value::from(" 42 "), &ParamType::Int, "x").unwrap(), Value::Int(42));
        assert_eq!(c.convert(Value::from("2.5"), &ParamType::Float, "x").unwrap(), Value::Float(2.5));
        assert_eq!(c.convert(Value::from("yes"), &ParamType::Bool, "x").unwrap(), Value::Bool(true));
        assert_eq!(c.convert(Value::Int(3), &ParamType::Float, "x").unwrap(), Value::Float(3.0));
        assert_eq!(c.convert(Value::Int(3), &ParamType::Str, "x").unwrap(), Value::from("3"));
    }

    #[test]
    fn rejects_bad_literals() {
        let c = SimpleTypeConverter::new();
        match c.convert(Value::from("abc"), &ParamType::Int, "property 'port'") {
            Err(ContainerError::Conversion { from, to, reason }) => {
                assert_eq!(from, "String");
                assert_eq!(to, "i64");
                assert!(reason.contains("property 'port'"));
            }
            other => panic!("Expected Conversion error, got: {other:?}"),
        }
        assert!(c.convert(Value::Bool(true), &ParamType::Int, "x").is_err());
    }

    #[test]
    fn bean_assignability() {
        let c = SimpleTypeConverter::new();
        let bean = Value::Bean(english());
        assert!(c.convert(bean.clone(), &ParamType::bean::<dyn Greeter>(), "x").is_ok());
        assert!(c.convert(bean.clone(), &ParamType::bean::<String>(), "x").is_err());

        let wrapped = c.convert(bean, &ParamType::list::<dyn Greeter>(), "x").unwrap();
        assert!(matches!(wrapped, Value::List(ref items) if items.len() == 1));
    }

    #[test]
    fn null_passes_for_references_only() {
        assert!(is_assignable(&ParamType::bean::<English>(), &Value::Null));
        assert!(!is_assignable(&ParamType::Int, &Value::Null));
    }

    #[test]
    fn weights_prefer_closer_types() {
        let value = vec![Value::Bean(english())];
        assert_eq!(type_difference_weight(&[ParamType::bean::<English>()], &value), 0);
        assert_eq!(type_difference_weight(&[ParamType::bean::<dyn Greeter>()], &value), 1);
        assert_eq!(type_difference_weight(&[ParamType::bean::<Base>()], &value), 4);
        assert_eq!(type_difference_weight(&[ParamType::Int], &value), UNASSIGNABLE);
        assert_eq!(type_difference_weight(&[], &value), UNASSIGNABLE);
        assert_eq!(
            type_difference_weight(&[ParamType::Bean(TypeKey::of::<String>())], &[Value::Null]),
            0
        );
    }
}
