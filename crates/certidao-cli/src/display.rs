//! Vertical card display for an extracted certificate.
//!
//! Renders a record grouped into sections, one `column  value` line per field.
//! Absent fields are shown as `-` so the fixed schema is always visible.

use std::fmt::Write;

use certidao_core::{CertidaoRecord, Field};

const LABEL_WIDTH: usize = 18;
const RULE_WIDTH: usize = 80;

// ── Section groupings ──

const REGISTRY: &[Field] = &[
    Field::Matricula,
    Field::RegistroAnterior,
    Field::DataRegistro,
    Field::Cartorio,
    Field::Livro,
    Field::Folha,
];

const OWNER: &[Field] = &[Field::Proprietario, Field::Cpf];

const PROPERTY: &[Field] = &[
    Field::EnderecoImovel,
    Field::Municipio,
    Field::Estado,
    Field::AreaTerreno,
];

const REMARKS: &[Field] = &[Field::Observacoes];

// ── Public API ──

/// Render a record as a grouped, human-readable card.
pub fn render_card(record: &CertidaoRecord) -> String {
    let mut out = String::new();
    let matricula = record.get(Field::Matricula).unwrap_or("não identificada");
    writeln!(out, "=== Certidão: matrícula {matricula} ===\n").ok();

    render_section(&mut out, "Registro", REGISTRY, record);
    render_section(&mut out, "Proprietário", OWNER, record);
    render_section(&mut out, "Imóvel", PROPERTY, record);
    render_section(&mut out, "Observações", REMARKS, record);

    writeln!(
        out,
        "{} of {} fields filled",
        record.filled_count(),
        Field::ALL.len()
    )
    .ok();
    out
}

/// Render JSON pretty-printed, with non-ASCII characters left as-is.
pub fn render_json(value: &serde_json::Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Print a titled block framed by horizontal rules.
pub fn print_block(title: &str, body: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("\n{rule}\n{title}\n{rule}");
    println!("{}", body.trim_end());
}

// ── Section rendering ──

fn render_section(out: &mut String, header: &str, fields: &[Field], record: &CertidaoRecord) {
    writeln!(out, "{header}").ok();
    for &field in fields {
        let value = record.get(field).unwrap_or("-");
        let mut lines = value.lines();
        let first = lines.next().unwrap_or("-");
        writeln!(out, "  {:<w$} {}", field.column(), first, w = LABEL_WIDTH).ok();
        // Continuation lines align under the value column.
        for line in lines {
            writeln!(out, "  {:<w$} {}", "", line, w = LABEL_WIDTH).ok();
        }
    }
    out.push('\n');
}
