//! Assistant wording: questions, menus, acknowledgements and error messages.

use rust_decimal::Decimal;

use super::catalog::{
    FieldDefinition, FieldKind, FlowKind, ID_METHOD_CLIENT_NUMBER, ID_METHOD_FULL_NAME,
    ID_METHOD_RUT, TextFormat,
};
use crate::error::{SubmissionError, ValidationError};
use crate::gateway::{AccountRecord, Comparison, EmergencyAck};

pub const GREETING: &str = "¡Hola! Soy el chatbot de la Cooperativa de Agua Potable La Compañía. ¿En qué puedo ayudarte hoy?";

/// Main menu options, in display order.
pub const HOME_OPTIONS: &[(&str, FlowKind)] = &[
    ("Reportar emergencia", FlowKind::Emergency),
    ("Consulta de boletas", FlowKind::AccountLookup),
];

pub const BUSY: &str = "⏳ Estoy procesando tu solicitud anterior, espera un momento.";

pub const TRY_AGAIN_EMPTY: &str = "No recibí ninguna respuesta. Inténtalo de nuevo.";

/// Greeting plus the main menu.
pub fn home_menu() -> String {
    let mut text = format!("{GREETING}\n");
    for (i, (label, _)) in HOME_OPTIONS.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, label));
    }
    text.push_str("\n\nTambién puedes escribirme tu pregunta sobre facturación, servicios o pagos.");
    text
}

pub fn flow_intro(flow: FlowKind) -> &'static str {
    match flow {
        FlowKind::Emergency => {
            "Entendido, voy a recopilar información sobre tu emergencia. Comenzamos:"
        }
        FlowKind::AccountLookup => "Perfecto, te ayudo con tu consulta de boletas.",
    }
}

/// Numbered menu, 1-based, in catalog order.
pub fn numbered(options: &[&str]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}", i + 1, option))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Question for a catalog field. `id_method` phrases the identification
/// value question after the method has been chosen.
pub fn question(field: &FieldDefinition, id_method: Option<usize>) -> String {
    match field.kind {
        FieldKind::Choice { choices, .. } => format!(
            "Selecciona {}:\n{}\n\nResponde con el número de la opción.",
            field.label.to_lowercase(),
            numbered(choices)
        ),
        FieldKind::FreeText(TextFormat::Identifier) => match id_method {
            Some(ID_METHOD_CLIENT_NUMBER) => "Ingresa tu número de cliente:".to_string(),
            Some(ID_METHOD_RUT) => "Ingresa tu RUT (ej: 12.345.678-9):".to_string(),
            Some(ID_METHOD_FULL_NAME) => "Ingresa el nombre completo del titular:".to_string(),
            _ => format!("Ingresa tu {}:", field.label.to_lowercase()),
        },
        FieldKind::FreeText(_) => format!("¿Cuál es tu {}?", field.label.to_lowercase()),
    }
}

pub fn acknowledge(label: &str) -> String {
    format!("Seleccionaste: {label}.")
}

pub fn other_prompt(field: &FieldDefinition) -> String {
    format!(
        "Cuéntame con tus palabras el {} que quieres informar:",
        field.label.to_lowercase()
    )
}

pub const PHOTO_QUESTION: &str =
    "¿Quieres adjuntar una foto de la emergencia?\n1. Sí\n2. No";

pub const AWAITING_IMAGE: &str =
    "Adjunta la imagen con el botón de archivo. Si prefieres no enviarla, escribe \"omitir\".";

pub const SENDING_EMERGENCY: &str =
    "✓ Gracias por proporcionar toda la información. Enviando tu reporte de emergencia...";

pub const SEARCHING_RECORDS: &str = "Buscando tus boletas...";

pub const COMPARING: &str = "Comparando las boletas seleccionadas...";

pub const NO_RECORDS: &str = "No encontré boletas asociadas a esos datos.";

pub const FOLLOW_UP_HINT: &str =
    "Si tienes otra pregunta, escríbela. Para volver al inicio usa el botón de inicio.";

pub fn missing_fields(keys: &[&str]) -> String {
    format!(
        "⚠ Faltan datos obligatorios ({}). Reinicia el reporte para completarlos.",
        keys.join(", ")
    )
}

pub fn emergency_sent(ack: &EmergencyAck) -> String {
    let mut text =
        "✓ Emergencia enviada correctamente. Nuestro equipo está en camino.".to_string();
    if let Some(id) = &ack.id {
        text.push_str(&format!(" Número de reporte: {id}."));
    }
    if let Some(message) = &ack.mensaje {
        text.push_str(&format!("\n{message}"));
    }
    text
}

fn money(amount: Decimal) -> String {
    format!("${}", amount.round_dp(0))
}

/// One-line summary of a record.
pub fn record_line(record: &AccountRecord) -> String {
    let mut parts = vec![format!(
        "Boleta {}",
        record.periodo.as_deref().unwrap_or(record.id.as_str())
    )];
    if let Some(consumo) = record.consumo {
        parts.push(format!("{} m³", consumo.normalize()));
    }
    if let Some(monto) = record.monto {
        parts.push(money(monto));
    }
    if let Some(vencimiento) = &record.vencimiento {
        parts.push(format!("vence {vencimiento}"));
    }
    if let Some(estado) = &record.estado {
        parts.push(estado.clone());
    }
    parts.join(" · ")
}

pub fn records_found(records: &[AccountRecord]) -> String {
    let lines: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, record_line(r)))
        .collect();
    format!("Encontré {} boleta(s):\n{}", records.len(), lines.join("\n"))
}

pub fn compare_candidates(records: &[AccountRecord]) -> String {
    format!(
        "{}\n\n¿Cuáles quieres comparar? Escribe los números separados por coma (ej: 1,2).",
        records_found(records)
    )
}

pub fn comparison_summary(comparison: &Comparison) -> String {
    let stats = &comparison.stats;
    format!(
        "Resumen de la comparación:\n• Boletas comparadas: {}\n• Consumo total: {} m³\n• Monto total: {}",
        stats.count,
        stats.total_consumption.normalize(),
        money(stats.total_amount)
    )
}

/// Corrective message for rejected input. `choice_count` is the size of the
/// menu being answered, when there is one.
pub fn rejection(err: &ValidationError, choice_count: Option<usize>) -> String {
    match err {
        ValidationError::EmptyInput => TRY_AGAIN_EMPTY.to_string(),
        ValidationError::NotANumber { .. } | ValidationError::OutOfRange { .. } => {
            let max = match err {
                ValidationError::OutOfRange { max, .. } => *max,
                _ => choice_count.unwrap_or(1),
            };
            format!("Por favor, elige un número entre 1 y {max}.")
        }
        ValidationError::InvalidPhone => {
            "Introduce un teléfono válido (ej: +56 9 1234 5678).".to_string()
        }
        ValidationError::InvalidName => {
            "Introduce un nombre válido (al menos 3 letras).".to_string()
        }
        ValidationError::InvalidRut => {
            "El RUT no tiene un formato válido. Usa el formato 12.345.678-9.".to_string()
        }
        ValidationError::InvalidClientNumber => {
            "El número de cliente debe contener solo dígitos (máximo 10).".to_string()
        }
        ValidationError::InvalidYesNo => "Responde 1 (Sí) o 2 (No).".to_string(),
        ValidationError::InvalidSelection { token } => format!(
            "La opción \"{token}\" no es válida. Escribe números de la lista separados por coma."
        ),
        ValidationError::EmptySelection => {
            "Indica al menos una boleta, por ejemplo: 1,2.".to_string()
        }
        ValidationError::ImageRequired => AWAITING_IMAGE.to_string(),
        ValidationError::ImageNotExpected => {
            "En este momento no estoy esperando una imagen.".to_string()
        }
        ValidationError::EmptyImage => {
            "La imagen está vacía. Intenta adjuntarla de nuevo.".to_string()
        }
        ValidationError::SubmissionInFlight => BUSY.to_string(),
    }
}

/// User-facing message for a failed submission. Field errors returned by
/// the service are quoted verbatim.
pub fn submission_failed(err: &SubmissionError) -> String {
    match err {
        SubmissionError::Rejected { field_errors, .. } => {
            let lines: Vec<String> = field_errors.iter().map(|e| format!("• {e}")).collect();
            format!(
                "⚠ El servicio no aceptó la solicitud:\n{}\n\nCorrige los datos con el botón de reinicio o intenta nuevamente.",
                lines.join("\n")
            )
        }
        _ => "⚠ Hubo un error al enviar tu solicitud. Por favor, intenta nuevamente.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::error::FieldError;
    use crate::flow::catalog::field_at;
    use crate::gateway::CompareStats;

    #[test]
    fn home_menu_lists_both_flows() {
        let menu = home_menu();
        assert!(menu.starts_with(GREETING));
        assert!(menu.contains("1. Reportar emergencia"));
        assert!(menu.contains("2. Consulta de boletas"));
    }

    #[test]
    fn choice_question_numbers_options() {
        let sector = field_at(FlowKind::Emergency, 2).unwrap();
        let q = question(sector, None);
        assert!(q.contains("1. Centro"));
        assert!(q.contains("3. La Compañía"));
        assert!(q.contains("5. Sector Rural"));
    }

    #[test]
    fn free_text_question_uses_label() {
        let name = field_at(FlowKind::Emergency, 0).unwrap();
        assert_eq!(question(name, None), "¿Cuál es tu nombre completo?");
    }

    #[test]
    fn identifier_question_depends_on_method() {
        let value = field_at(FlowKind::AccountLookup, 2).unwrap();
        assert!(question(value, Some(ID_METHOD_RUT)).contains("RUT"));
        assert!(question(value, Some(ID_METHOD_CLIENT_NUMBER)).contains("número de cliente"));
    }

    #[test]
    fn range_rejection_mentions_bounds() {
        let msg = rejection(&ValidationError::OutOfRange { value: 9, max: 4 }, Some(4));
        assert!(msg.contains("entre 1 y 4"));
        let msg = rejection(
            &ValidationError::NotANumber {
                input: "alta".into(),
            },
            Some(4),
        );
        assert!(msg.contains("entre 1 y 4"));
    }

    #[test]
    fn rejected_submission_quotes_server_text() {
        let err = SubmissionError::Rejected {
            operation: "create_emergency_report".into(),
            field_errors: vec![FieldError {
                field: Some("telefono".into()),
                message: "Número no registrado en la cooperativa.".into(),
            }],
        };
        let msg = submission_failed(&err);
        assert!(msg.contains("telefono: Número no registrado en la cooperativa."));
    }

    #[test]
    fn comparison_summary_shows_service_stats() {
        let comparison = Comparison {
            records: vec![],
            stats: CompareStats {
                count: 2,
                total_consumption: dec!(31.50),
                total_amount: dec!(28990),
            },
        };
        let text = comparison_summary(&comparison);
        assert!(text.contains("Boletas comparadas: 2"));
        assert!(text.contains("31.5 m³"));
        assert!(text.contains("$28990"));
    }

    #[test]
    fn record_line_falls_back_to_id() {
        let record = AccountRecord {
            id: "b-1".into(),
            numero_cliente: None,
            periodo: None,
            consumo: Some(dec!(12.0)),
            monto: None,
            vencimiento: None,
            estado: Some("Pagada".into()),
        };
        assert_eq!(record_line(&record), "Boleta b-1 · 12 m³ · Pagada");
    }
}
