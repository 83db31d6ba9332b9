use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Integer primary keys wrapped per table so they cannot be mixed up.
macro_rules! record_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = ParseIntError;

                fn from_str(raw: &str) -> Result<Self, Self::Err> {
                    raw.trim().parse::<i64>().map(Self)
                }
            }
        )+
    };
}

record_id!(
    UserId,
    CourseId,
    LessonId,
    PaymentId,
    EnrollmentId,
    QuizId,
    QuestionId,
    AnswerOptionId,
    AttemptId,
    ResponseId,
    AssignmentId,
    SubmissionId,
    CertificateId,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_integers() {
        assert_eq!(" 42 ".parse::<PaymentId>().expect("parses"), PaymentId(42));
        assert!("abc".parse::<CourseId>().is_err());
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&EnrollmentId(7)).expect("serializes");
        assert_eq!(json, "7");
    }
}
