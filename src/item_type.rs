//! Step Type Classification
//!
//! Maps the raw `type` token of a step descriptor onto a closed set of step
//! kinds. Classification is total: anything unrecognised becomes
//! [`StepKind::Custom`], and the step factory decides what to do with it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keyword for a nested subtask step.
pub const SUBTASK_KEY: &str = "subtask";

/// Prefix for data-groups steps. The remainder after `dataGroups.` names the
/// form subtype used to render the groups.
pub const DATA_GROUPS_KEY: &str = "dataGroups";

/// Error returned when a token is not a member of a subtype vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {vocabulary} token: {token}")]
pub struct UnknownToken {
    pub vocabulary: &'static str,
    pub token: String,
}

// Each subtype vocabulary is a plain enum with a canonical string form. The
// macro keeps `as_str`, `FromStr` and `Display` in lockstep with `ALL`.
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $vocabulary:literal {
            $($(#[$vmeta:meta])* $variant:ident => $token:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownToken;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    other => Err(UnknownToken {
                        vocabulary: $vocabulary,
                        token: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

token_enum! {
    /// Informational steps.
    InstructionSubtype, "instruction" {
        Instruction => "instruction",
        Completion => "completion",
    }
}

token_enum! {
    /// Question (form) steps, keyed by answer format.
    FormSubtype, "form" {
        /// More than one form item
        Compound => "compound",
        Toggle => "toggle",
        Boolean => "boolean",
        SingleChoice => "singleChoiceText",
        MultipleChoice => "multipleChoiceText",
        Text => "textfield",
        MultipleLineText => "multilineText",
        Date => "datePicker",
        DateTime => "timeAndDatePicker",
        Time => "timePicker",
        Duration => "timeInterval",
        Integer => "numericInteger",
        Decimal => "numericDecimal",
        Scale => "scaleInteger",
        ContinuousScale => "continuousScale",
        /// Single choice over timing ranges
        TimingRange => "timingRange",
    }
}

token_enum! {
    ConsentSubtype, "consent" {
        SharingOptions => "consentSharingOptions",
        Review => "consentReview",
        Visual => "consentVisual",
    }
}

token_enum! {
    AccountSubtype, "account" {
        Registration => "registration",
        Login => "login",
        EmailVerification => "emailVerification",
        ExternalId => "externalID",
        Permissions => "permissions",
        Profile => "profile",
    }
}

token_enum! {
    PasscodeSubtype, "passcode" {
        SixDigit => "passcodeType6Digit",
        FourDigit => "passcodeType4Digit",
    }
}

impl FormSubtype {
    /// Choice answers are always recorded as a list of selected values.
    pub fn is_choice(&self) -> bool {
        matches!(self, FormSubtype::SingleChoice | FormSubtype::MultipleChoice)
    }
}

/// The typed kind of a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "subtype")]
pub enum StepKind {
    Custom(Option<String>),
    Subtask,
    Instruction(InstructionSubtype),
    Form(FormSubtype),
    Consent(ConsentSubtype),
    DataGroups(FormSubtype),
    Account(AccountSubtype),
    Passcode(PasscodeSubtype),
}

impl StepKind {
    /// Classify a raw type token. First match wins, in this order:
    /// instruction, form, `dataGroups` prefix, consent, account, passcode,
    /// `subtask`, then the custom fallback.
    pub fn classify(token: Option<&str>) -> StepKind {
        let Some(token) = token else {
            return StepKind::Custom(None);
        };

        if let Ok(subtype) = token.parse::<InstructionSubtype>() {
            StepKind::Instruction(subtype)
        } else if let Ok(subtype) = token.parse::<FormSubtype>() {
            StepKind::Form(subtype)
        } else if token.starts_with(DATA_GROUPS_KEY) {
            let subtype = token
                .strip_prefix(DATA_GROUPS_KEY)
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|suffix| suffix.parse::<FormSubtype>().ok())
                .unwrap_or(FormSubtype::MultipleChoice);
            StepKind::DataGroups(subtype)
        } else if let Ok(subtype) = token.parse::<ConsentSubtype>() {
            StepKind::Consent(subtype)
        } else if let Ok(subtype) = token.parse::<AccountSubtype>() {
            StepKind::Account(subtype)
        } else if let Ok(subtype) = token.parse::<PasscodeSubtype>() {
            StepKind::Passcode(subtype)
        } else if token == SUBTASK_KEY {
            StepKind::Subtask
        } else {
            StepKind::Custom(Some(token.to_string()))
        }
    }

    /// Canonical token for this kind, if it has one. Classifying the returned
    /// token yields `self` again.
    pub fn type_token(&self) -> Option<String> {
        match self {
            StepKind::Custom(token) => token.clone(),
            StepKind::Subtask => Some(SUBTASK_KEY.to_string()),
            StepKind::Instruction(s) => Some(s.as_str().to_string()),
            StepKind::Form(s) => Some(s.as_str().to_string()),
            StepKind::Consent(s) => Some(s.as_str().to_string()),
            StepKind::DataGroups(s) => Some(format!("{}.{}", DATA_GROUPS_KEY, s.as_str())),
            StepKind::Account(s) => Some(s.as_str().to_string()),
            StepKind::Passcode(s) => Some(s.as_str().to_string()),
        }
    }

    /// Form subtype for form and data-groups steps.
    pub fn form_subtype(&self) -> Option<FormSubtype> {
        match self {
            StepKind::Form(s) | StepKind::DataGroups(s) => Some(*s),
            _ => None,
        }
    }

    pub fn consent_subtype(&self) -> Option<ConsentSubtype> {
        match self {
            StepKind::Consent(s) => Some(*s),
            _ => None,
        }
    }

    pub fn account_subtype(&self) -> Option<AccountSubtype> {
        match self {
            StepKind::Account(s) => Some(*s),
            _ => None,
        }
    }

    /// True for the kind produced from an absent token.
    pub fn is_nil_type(&self) -> bool {
        matches!(self, StepKind::Custom(None))
    }

    pub fn uses_placeholder_text(&self) -> bool {
        matches!(
            self,
            StepKind::Form(FormSubtype::Text) | StepKind::Form(FormSubtype::MultipleLineText)
        )
    }

    /// The raw token of a custom step.
    pub fn custom_type_identifier(&self) -> Option<&str> {
        match self {
            StepKind::Custom(token) => token.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_token() {
            Some(token) => f.write_str(&token),
            None => f.write_str("(none)"),
        }
    }
}
