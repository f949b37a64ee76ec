//! Static field catalogs for each flow.

use serde::{Deserialize, Serialize};

/// Which guided conversation is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Emergency,
    AccountLookup,
}

impl FlowKind {
    pub fn catalog(&self) -> &'static [FieldDefinition] {
        match self {
            Self::Emergency => EMERGENCY_FIELDS,
            Self::AccountLookup => ACCOUNT_LOOKUP_FIELDS,
        }
    }
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Emergency => "emergency",
            Self::AccountLookup => "account_lookup",
        };
        write!(f, "{s}")
    }
}

/// Format constraint applied to a free-text answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// Any non-blank text, stored verbatim.
    Any,
    FullName,
    Phone,
    /// Format depends on the identification method chosen earlier in the flow.
    Identifier,
}

/// How a field collects its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    FreeText(TextFormat),
    /// 1-based numeric selection from a fixed menu. With `allow_other`, the
    /// last choice opens a follow-up free-text capture.
    Choice {
        choices: &'static [&'static str],
        allow_other: bool,
    },
}

/// One question in a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Wire name used in the record and the submitted payload.
    pub key: &'static str,
    /// Human label, used to phrase the question.
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldDefinition {
    pub fn choices(&self) -> Option<&'static [&'static str]> {
        match self.kind {
            FieldKind::Choice { choices, .. } => Some(choices),
            FieldKind::FreeText(_) => None,
        }
    }

    pub fn allows_other(&self) -> bool {
        matches!(self.kind, FieldKind::Choice { allow_other: true, .. })
    }

    /// Whether the 1-based `option` is the "Other" escape for this field.
    pub fn is_other_option(&self, option: usize) -> bool {
        match self.kind {
            FieldKind::Choice {
                choices,
                allow_other: true,
            } => option == choices.len(),
            _ => false,
        }
    }
}

/// Field keys, shared by the engine and the gateway payloads.
pub mod keys {
    pub const FULL_NAME: &str = "nombreCompleto";
    pub const PHONE: &str = "telefono";
    pub const SECTOR: &str = "sector";
    pub const ADDRESS: &str = "direccion";
    pub const EMERGENCY_TYPE: &str = "tipoEmergencia";
    pub const SEVERITY: &str = "estadoEmergencia";
    pub const DESCRIPTION: &str = "descripcion";

    pub const QUERY_TYPE: &str = "tipoConsulta";
    pub const ID_METHOD: &str = "metodoIdentificacion";
    pub const ID_VALUE: &str = "valorIdentificacion";
}

pub const SECTORS: &[&str] = &[
    "Centro",
    "Villa Los Aromos",
    "La Compañía",
    "El Bosque",
    "Sector Rural",
];

pub const EMERGENCY_TYPES: &[&str] = &[
    "Sin Agua",
    "Baja Presión",
    "Fuga de Agua",
    "Agua Turbia",
    "Rotura de Matriz",
    "Medidor Dañado",
    "Otro",
];

pub const SEVERITIES: &[&str] = &["Baja", "Media", "Alta", "Crítica"];

pub const QUERY_TYPES: &[&str] = &["Consumo", "Monto a pagar", "Comparar boletas"];

pub const ID_METHODS: &[&str] = &["Número de cliente", "RUT", "Nombre completo"];

/// 1-based positions inside [`QUERY_TYPES`] and [`ID_METHODS`].
pub const QUERY_COMPARE: usize = 3;
pub const ID_METHOD_CLIENT_NUMBER: usize = 1;
pub const ID_METHOD_RUT: usize = 2;
pub const ID_METHOD_FULL_NAME: usize = 3;

static EMERGENCY_FIELDS: &[FieldDefinition] = &[
    FieldDefinition {
        key: keys::FULL_NAME,
        label: "Nombre completo",
        kind: FieldKind::FreeText(TextFormat::FullName),
    },
    FieldDefinition {
        key: keys::PHONE,
        label: "Teléfono",
        kind: FieldKind::FreeText(TextFormat::Phone),
    },
    FieldDefinition {
        key: keys::SECTOR,
        label: "Sector",
        kind: FieldKind::Choice {
            choices: SECTORS,
            allow_other: false,
        },
    },
    FieldDefinition {
        key: keys::ADDRESS,
        label: "Dirección",
        kind: FieldKind::FreeText(TextFormat::Any),
    },
    FieldDefinition {
        key: keys::EMERGENCY_TYPE,
        label: "Tipo de emergencia",
        kind: FieldKind::Choice {
            choices: EMERGENCY_TYPES,
            allow_other: true,
        },
    },
    FieldDefinition {
        key: keys::SEVERITY,
        label: "Gravedad de la emergencia",
        kind: FieldKind::Choice {
            choices: SEVERITIES,
            allow_other: false,
        },
    },
    FieldDefinition {
        key: keys::DESCRIPTION,
        label: "Descripción detallada",
        kind: FieldKind::FreeText(TextFormat::Any),
    },
];

static ACCOUNT_LOOKUP_FIELDS: &[FieldDefinition] = &[
    FieldDefinition {
        key: keys::QUERY_TYPE,
        label: "Tipo de consulta",
        kind: FieldKind::Choice {
            choices: QUERY_TYPES,
            allow_other: false,
        },
    },
    FieldDefinition {
        key: keys::ID_METHOD,
        label: "Método de identificación",
        kind: FieldKind::Choice {
            choices: ID_METHODS,
            allow_other: false,
        },
    },
    FieldDefinition {
        key: keys::ID_VALUE,
        label: "Dato de identificación",
        kind: FieldKind::FreeText(TextFormat::Identifier),
    },
];

/// Field definition at `step_index`, or `None` past the end of the catalog
/// (virtual and terminal steps are handled by the engine).
pub fn field_at(flow: FlowKind, step_index: usize) -> Option<&'static FieldDefinition> {
    flow.catalog().get(step_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_catalog_order() {
        let keys: Vec<&str> = FlowKind::Emergency.catalog().iter().map(|f| f.key).collect();
        assert_eq!(
            keys,
            vec![
                "nombreCompleto",
                "telefono",
                "sector",
                "direccion",
                "tipoEmergencia",
                "estadoEmergencia",
                "descripcion"
            ]
        );
    }

    #[test]
    fn account_catalog_has_two_menus_then_value() {
        let catalog = FlowKind::AccountLookup.catalog();
        assert_eq!(catalog.len(), 3);
        assert!(catalog[0].choices().is_some());
        assert!(catalog[1].choices().is_some());
        assert_eq!(catalog[2].kind, FieldKind::FreeText(TextFormat::Identifier));
    }

    #[test]
    fn field_at_past_end_is_none() {
        assert!(field_at(FlowKind::Emergency, 6).is_some());
        assert!(field_at(FlowKind::Emergency, 7).is_none());
        assert!(field_at(FlowKind::AccountLookup, 3).is_none());
    }

    #[test]
    fn only_emergency_type_allows_other() {
        let with_other: Vec<&str> = FlowKind::Emergency
            .catalog()
            .iter()
            .chain(FlowKind::AccountLookup.catalog())
            .filter(|f| f.allows_other())
            .map(|f| f.key)
            .collect();
        assert_eq!(with_other, vec![keys::EMERGENCY_TYPE]);
    }

    #[test]
    fn other_option_is_last_choice() {
        let field = field_at(FlowKind::Emergency, 4).unwrap();
        assert!(field.is_other_option(7));
        assert!(!field.is_other_option(6));
        let sector = field_at(FlowKind::Emergency, 2).unwrap();
        assert!(!sector.is_other_option(SECTORS.len()));
    }

    #[test]
    fn scenario_labels_at_expected_positions() {
        assert_eq!(SECTORS[2], "La Compañía");
        assert_eq!(EMERGENCY_TYPES[1], "Baja Presión");
        assert_eq!(SEVERITIES[0], "Baja");
        assert_eq!(QUERY_TYPES[QUERY_COMPARE - 1], "Comparar boletas");
        assert_eq!(ID_METHODS[ID_METHOD_RUT - 1], "RUT");
    }
}
