use crate::model::{
    Id,
    user::{Education, UserMarker, join_name},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Enrollment years the directory offers to browse.
pub const KNOWN_CLASS_YEARS: [u16; 5] = [2021, 2022, 2023, 2024, 2025];

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct ClassroomMember {
    #[serde(rename = "_id")]
    pub id: Id<UserMarker>,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<Education>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ClassroomMember {
    #[must_use]
    pub fn display_name(&self) -> String {
        let full_name = join_name(&self.firstname, &self.lastname);
        if full_name.is_empty() {
            self.email.clone()
        } else {
            full_name
        }
    }

    #[must_use]
    pub fn major(&self) -> Option<&str> {
        self.education.as_ref()?.major.as_deref()
    }

    #[must_use]
    pub fn student_id(&self) -> Option<&str> {
        self.education.as_ref()?.student_id.as_deref()
    }

    #[must_use]
    pub fn school_name(&self) -> Option<&str> {
        let education = self.education.as_ref()?;
        education
            .school
            .as_ref()
            .and_then(|school| school.name.as_deref())
            .or(education.school_province.as_deref())
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Not a class year: {0:?}")]
pub struct InvalidClassYearError(String);

/// Four digit enrollment year naming one page of the classmate directory.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct ClassYear(u16);

impl ClassYear {
    pub fn new(year: u16) -> Result<Self, InvalidClassYearError> {
        if (1000..=9999).contains(&year) {
            Ok(Self(year))
        } else {
            Err(InvalidClassYearError(year.to_string()))
        }
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn known() -> impl DoubleEndedIterator<Item = ClassYear> {
        KNOWN_CLASS_YEARS.into_iter().map(ClassYear)
    }

    /// The preceding known year, if any.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        Self::known().rev().find(|year| *year < self)
    }

    /// The following known year, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::known().find(|year| *year > self)
    }
}

impl Display for ClassYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for ClassYear {
    type Err = InvalidClassYearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(InvalidClassYearError(s.to_owned()));
        }

        let year = s
            .parse()
            .map_err(|_| InvalidClassYearError(s.to_owned()))?;
        Self::new(year)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        classroom::{ClassYear, ClassroomMember},
        user::{Education, School},
    };

    #[test]
    fn class_year_parsing() {
        assert_eq!("2023".parse::<ClassYear>().unwrap().get(), 2023);
        assert!("23".parse::<ClassYear>().is_err());
        assert!("20x3".parse::<ClassYear>().is_err());
        assert!("+202".parse::<ClassYear>().is_err());
        assert!(ClassYear::new(99).is_err());
    }

    #[test]
    fn class_year_paging() {
        let first = ClassYear::new(2021).unwrap();
        let last = ClassYear::new(2025).unwrap();

        assert_eq!(first.previous(), None);
        assert_eq!(first.next(), Some(ClassYear::new(2022).unwrap()));
        assert_eq!(last.previous(), Some(ClassYear::new(2024).unwrap()));
        assert_eq!(last.next(), None);
        assert_eq!(ClassYear::known().count(), 5);
    }

    #[test]
    fn member_display_fallbacks() {
        let mut member = ClassroomMember {
            id: Id::new("u1"),
            email: String::from("u1@example.com"),
            ..ClassroomMember::default()
        };
        assert_eq!(member.display_name(), "u1@example.com");
        assert_eq!(member.school_name(), None);

        member.firstname = String::from("Somchai");
        assert_eq!(member.display_name(), "Somchai");

        member.education = Some(Education {
            school_province: Some(String::from("Khon Kaen")),
            ..Education::default()
        });
        assert_eq!(member.school_name(), Some("Khon Kaen"));

        member.education = Some(Education {
            school: Some(School {
                name: Some(String::from("KKW")),
                ..School::default()
            }),
            school_province: Some(String::from("Khon Kaen")),
            ..Education::default()
        });
        assert_eq!(member.school_name(), Some("KKW"));
    }
}
