//! Label folding and translation of menu labels to machine keys.
//!
//! Folding decomposes to NFD, drops combining marks, lowercases, turns
//! punctuation into spaces and collapses whitespace, so `"Baja Presión"`,
//! `"baja presion"` and `"BAJA-PRESIÓN!"` all fold to `"baja presion"`.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Folded label → machine key.
const MACHINE_KEYS: &[(&str, &str)] = &[
    // Sectors
    ("centro", "centro"),
    ("villa los aromos", "villa_los_aromos"),
    ("la compania", "la_compania"),
    ("el bosque", "el_bosque"),
    ("sector rural", "rural"),
    // Emergency types
    ("sin agua", "sin_agua"),
    ("baja presion", "baja_presion"),
    ("fuga de agua", "fuga"),
    ("agua turbia", "agua_turbia"),
    ("rotura de matriz", "rotura_matriz"),
    ("medidor danado", "medidor_danado"),
    ("otro", "otro"),
    // Severities
    ("baja", "baja"),
    ("media", "media"),
    ("alta", "alta"),
    ("critica", "critica"),
    // Account queries
    ("consumo", "consumo"),
    ("monto a pagar", "monto_adeudado"),
    ("comparar boletas", "comparar"),
    ("numero de cliente", "numero_cliente"),
    ("rut", "rut"),
    ("nombre completo", "nombre_completo"),
];

/// Accent-, case- and punctuation-insensitive form of `text`.
pub fn fold(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key sent for a label with nothing in it.
const BLANK_KEY: &str = "otro";

/// Machine key for a menu label. Unknown labels fall back to the raw label
/// (trimmed); a blank label maps to [`BLANK_KEY`], never to an empty string.
pub fn machine_key(label: &str) -> String {
    let folded = fold(label);
    if let Some((_, key)) = MACHINE_KEYS.iter().find(|(known, _)| *known == folded) {
        return key.to_string();
    }
    match label.trim() {
        "" => BLANK_KEY.to_string(),
        raw => raw.to_string(),
    }
}
