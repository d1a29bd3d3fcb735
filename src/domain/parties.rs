use super::money::Cents;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Default,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(CompanyId);
id_type!(InvestorId);
id_type!(RoundId);
id_type!(PaymentId);

/// The slice of an investor record this subsystem is allowed to see:
/// onboarding completeness, sanctioned-jurisdiction residency, and the
/// minimum payment the investor has configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorProfile {
    pub investor: InvestorId,
    pub onboarded: bool,
    pub sanctioned_resident: bool,
    pub minimum_payment: Cents,
}

/// One underlying security within a pass-through entity, with the amount
/// the holder invested through it. Splits are weighted by `invested`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityHolding {
    pub investor: InvestorId,
    pub invested: Cents,
}

/// A company's alive-and-ready payment source record.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSource {
    pub payment_method_id: String,
    pub mandate_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminContact {
    pub name: String,
    pub email: String,
}
