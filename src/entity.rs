use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Who an actor is in the portal. `User` is a resident; every other role is
/// an official, and all but `SuperAdmin` are departments requests can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Rais,
    YoshlarYetakchisi,
    IjtimoiyXodim,
    Inspektor,
    HokimYordamchisi,
    SoliqInspektori,
    AyollarFaoli,
    SuperAdmin,
}

/// (role, wire name, display name)
const ROLE_TABLE: [(Role, &str, &str); 9] = [
    (Role::User, "user", "Fuqaro"),
    (Role::Rais, "rais", "Mahalla Raisi"),
    (Role::YoshlarYetakchisi, "yoshlar_yetakchisi", "Yoshlar Yetakchisi"),
    (Role::IjtimoiyXodim, "ijtimoiy_xodim", "Ijtimoiy Xodim"),
    (Role::Inspektor, "inspektor", "Profilaktika Inspektori"),
    (Role::HokimYordamchisi, "hokim_yordamchisi", "Hokim Yordamchisi"),
    (Role::SoliqInspektori, "soliq_inspektori", "Soliq Inspektori"),
    (Role::AyollarFaoli, "ayollar_faoli", "Ayollar Faoli"),
    (Role::SuperAdmin, "super_admin", "Super Admin"),
];

impl Role {
    /// Roles a resident can address a request to.
    pub const DEPARTMENTS: [Role; 7] = [
        Role::Rais,
        Role::YoshlarYetakchisi,
        Role::IjtimoiyXodim,
        Role::Inspektor,
        Role::HokimYordamchisi,
        Role::SoliqInspektori,
        Role::AyollarFaoli,
    ];

    fn entry(self) -> &'static (Role, &'static str, &'static str) {
        // The table is indexed by declaration order.
        &ROLE_TABLE[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    pub fn display_name(self) -> &'static str {
        self.entry().2
    }

    pub fn is_official(self) -> bool {
        self != Role::User
    }

    pub fn is_department(self) -> bool {
        !matches!(self, Role::User | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ROLE_TABLE
            .iter()
            .find(|(_, wire, _)| *wire == s)
            .map(|(role, _, _)| *role)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// An authenticated participant: resident or official.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub full_name: String,
    pub phone: String,
    pub role: Role,
}

impl Actor {
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        phone: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: ActorId::new(id),
            full_name: full_name.into(),
            phone: phone.into(),
            role,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name, self.id)
    }
}
