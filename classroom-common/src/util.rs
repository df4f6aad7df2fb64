use thiserror::Error;
use time::Duration;

/// A duration strictly greater than zero, such as a request timeout.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    pub fn from_secs(seconds: u64) -> Result<Self, NonPositiveDurationError> {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        Duration::seconds(seconds).try_into()
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }

    #[must_use]
    pub fn as_std(&self) -> std::time::Duration {
        self.0.unsigned_abs()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::util::PositiveDuration;
    use time::Duration;

    #[test]
    fn zero_and_negative_are_rejected() {
        assert!(PositiveDuration::from_secs(0).is_err());
        assert!(PositiveDuration::try_from(Duration::seconds(-3)).is_err());
    }

    #[test]
    fn converts_to_std() {
        let timeout = PositiveDuration::from_secs(15).unwrap();

        assert_eq!(timeout.get(), Duration::seconds(15));
        assert_eq!(timeout.as_std(), std::time::Duration::from_secs(15));
    }
}
