use lazy_static::lazy_static;
use regex::Regex;
use serde::{ser::SerializeMap, Serialize, Serializer};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Field-level validation messages, kept in the order the fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(String, Vec<String>)>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: String) {
        match self.0.iter_mut().find(|(f, _)| f == field) {
            Some((_, messages)) => messages.push(message),
            None => self.0.push((field.to_string(), vec![message])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, messages)| messages.as_slice())
    }

    #[cfg(test)]
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// `required`: absent or blank values are rejected. Returns the value when present.
    pub fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => {
                self.add(field, format!("The {} field is required.", label(field)));
                None
            }
        }
    }

    /// `email`: only checked for present values, so a missing field reports once.
    pub fn email(&mut self, field: &str, value: Option<&str>) -> bool {
        match value {
            Some(v) if !is_valid_email(v) => {
                self.add(
                    field,
                    format!("The {} must be a valid email address.", label(field)),
                );
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn taken(&mut self, field: &str) {
        self.add(field, format!("The {} has already been taken.", label(field)));
    }

    /// `confirmed`: the confirmation must equal the value exactly.
    pub fn confirmed(&mut self, field: &str, value: Option<&str>, confirmation: Option<&str>) {
        if value.is_some() && value != confirmation {
            self.add(
                field,
                format!("The {} confirmation does not match.", label(field)),
            );
        }
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, messages) in &self.0 {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}
