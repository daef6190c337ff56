use super::{non_reversible, IntentionalNoop, Transformation, TransformationStatus, TransformWork};
use crate::error::Result;
use copybara_core::label::validate_label_name;

/// Add a label to the message being written.
#[derive(Debug, Clone)]
pub struct AddLabel {
    name: String,
    value: String,
    separator: String,
    ignore_if_exists: bool,
}

impl AddLabel {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        separator: impl Into<String>,
        ignore_if_exists: bool,
    ) -> Result<Self> {
        let name = name.into();
        validate_label_name(&name)?;
        Ok(Self {
            name,
            value: value.into(),
            separator: separator.into(),
            ignore_if_exists,
        })
    }
}

impl Transformation for AddLabel {
    fn transform(&self, work: &mut TransformWork) -> Result<TransformationStatus> {
        let exists = !work.parsed_message().label_values(&self.name).is_empty();
        if exists && self.ignore_if_exists {
            return Ok(TransformationStatus::Success);
        }
        work.add_label(&self.name, &self.value, &self.separator)?;
        Ok(TransformationStatus::Success)
    }

    fn reverse(&self) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(RemoveLabel {
            name: self.name.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("Adding label {}", self.name)
    }
}

/// Remove every occurrence of a label from the message.
#[derive(Debug, Clone)]
pub struct RemoveLabel {
    name: String,
}

impl RemoveLabel {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_label_name(&name)?;
        Ok(Self { name })
    }
}

impl Transformation for RemoveLabel {
    fn transform(&self, work: &mut TransformWork) -> Result<TransformationStatus> {
        work.remove_label(&self.name)?;
        Ok(TransformationStatus::Success)
    }

    fn reverse(&self) -> Result<Box<dyn Transformation>> {
        Err(non_reversible(&self.describe()))
    }

    fn describe(&self) -> String {
        format!("Removing label {}", self.name)
    }
}

/// Copy a label found in the migrated changes (or the requested revision)
/// into the message, optionally under a new name.
#[derive(Debug, Clone)]
pub struct ExposeLabel {
    name: String,
    new_name: String,
    separator: String,
    ignore_not_found: bool,
}

impl ExposeLabel {
    pub fn new(
        name: impl Into<String>,
        new_name: Option<String>,
        separator: impl Into<String>,
        ignore_not_found: bool,
    ) -> Result<Self> {
        let name = name.into();
        validate_label_name(&name)?;
        let new_name = new_name.unwrap_or_else(|| name.clone());
        validate_label_name(&new_name)?;
        Ok(Self {
            name,
            new_name,
            separator: separator.into(),
            ignore_not_found,
        })
    }
}

impl Transformation for ExposeLabel {
    fn transform(&self, work: &mut TransformWork) -> Result<TransformationStatus> {
        match work.label(&self.name) {
            Some(value) => {
                work.add_or_replace_label(&self.new_name, &value, &self.separator)?;
                Ok(TransformationStatus::Success)
            }
            None if self.ignore_not_found => Ok(TransformationStatus::Success),
            None => Ok(TransformationStatus::Noop(format!(
                "Cannot find label {}",
                self.name
            ))),
        }
    }

    fn reverse(&self) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(IntentionalNoop))
    }

    fn describe(&self) -> String {
        format!("Exposing label {} as {}", self.name, self.new_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use copybara_core::{Author, Change, Changes, Revision};

    fn work_with_change(message: &str) -> TransformWork {
        let change = Change::new(
            Revision::new("1"),
            Author::new("A", "a@x.com"),
            "Internal change\n\nsome_label=a",
            Utc::now(),
        );
        TransformWork::new(
            "/unused",
            message,
            Author::new("A", "a@x.com"),
            Changes::new(vec![change], vec![]),
            Revision::new("1"),
            false,
        )
    }

    #[test]
    fn add_and_remove_label() {
        let mut work = work_with_change("Title\n");
        AddLabel::new("Bug", "12", ": ", false).unwrap().transform(&mut work).unwrap();
        assert_eq!(work.message, "Title\n\nBug: 12\n");

        AddLabel::new("Bug", "13", ": ", true).unwrap().transform(&mut work).unwrap();
        assert_eq!(work.message, "Title\n\nBug: 12\n");

        RemoveLabel::new("Bug").unwrap().transform(&mut work).unwrap();
        assert_eq!(work.message, "Title\n");
        assert!(RemoveLabel::new("Bug").unwrap().reverse().is_err());
    }

    #[test]
    fn expose_label_from_change() {
        let mut work = work_with_change("Public title\n");
        ExposeLabel::new("some_label", Some("new_label".into()), "=", false)
            .unwrap()
            .transform(&mut work)
            .unwrap();
        assert_eq!(work.message, "Public title\n\nnew_label=a\n");
        assert_eq!(work.label("new_label").as_deref(), Some("a"));
    }

    #[test]
    fn expose_missing_label() {
        let mut work = work_with_change("Title\n");
        let strict = ExposeLabel::new("absent", None, ": ", false).unwrap();
        assert!(strict.transform(&mut work).unwrap().is_noop());
        let lenient = ExposeLabel::new("absent", None, ": ", true).unwrap();
        assert_eq!(lenient.transform(&mut work).unwrap(), TransformationStatus::Success);
    }
}
