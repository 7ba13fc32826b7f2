//! The fixed field catalogue of a property registry certificate and the
//! record built from a model's JSON reply.

use serde::Serialize;
use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::CoreError;

/// One named field of a "certidão de imóvel".
///
/// Each field has three names: the output column, the key the text model is
/// asked to emit, and a description used to build the structuring prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Matricula,
    Proprietario,
    Cpf,
    EnderecoImovel,
    Municipio,
    Estado,
    AreaTerreno,
    RegistroAnterior,
    DataRegistro,
    Cartorio,
    Livro,
    Folha,
    Observacoes,
}

impl Field {
    /// All fields in output order.
    pub const ALL: [Field; 13] = [
        Field::Matricula,
        Field::Proprietario,
        Field::Cpf,
        Field::EnderecoImovel,
        Field::Municipio,
        Field::Estado,
        Field::AreaTerreno,
        Field::RegistroAnterior,
        Field::DataRegistro,
        Field::Cartorio,
        Field::Livro,
        Field::Folha,
        Field::Observacoes,
    ];

    /// Column name used in CSV headers and the record card.
    pub fn column(self) -> &'static str {
        match self {
            Self::Matricula => "Matricula",
            Self::Proprietario => "Proprietario",
            Self::Cpf => "CPF",
            Self::EnderecoImovel => "Endereco_Imovel",
            Self::Municipio => "Municipio",
            Self::Estado => "Estado",
            Self::AreaTerreno => "Area_Terreno",
            Self::RegistroAnterior => "Registro_Anterior",
            Self::DataRegistro => "Data_Registro",
            Self::Cartorio => "Cartorio",
            Self::Livro => "Livro",
            Self::Folha => "Folha",
            Self::Observacoes => "Observacoes",
        }
    }

    /// Key the text model is asked to emit for this field.
    pub fn json_key(self) -> &'static str {
        match self {
            Self::Cpf => "CPF_Proprietario",
            other => other.column(),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Matricula => "Registry/Matricula Number",
            Self::Proprietario => "Owner name",
            Self::Cpf => "Owner CPF",
            Self::EnderecoImovel => "Property address - street, number, neighborhood",
            Self::Municipio => "City",
            Self::Estado => "State",
            Self::AreaTerreno => "Land area in m²",
            Self::RegistroAnterior => "Previous registry number if mentioned",
            Self::DataRegistro => "Registration date",
            Self::Cartorio => "Registry office name and location",
            Self::Livro => "Book number",
            Self::Folha => "Page number",
            Self::Observacoes => "Any important notes or remarks",
        }
    }
}

/// A single extracted certificate. Serialises with column names as keys, in
/// [`Field::ALL`] order, so the same value feeds both JSON and CSV output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CertidaoRecord {
    #[serde(rename = "Matricula")]
    pub matricula: Option<String>,
    #[serde(rename = "Proprietario")]
    pub proprietario: Option<String>,
    #[serde(rename = "CPF")]
    pub cpf: Option<String>,
    #[serde(rename = "Endereco_Imovel")]
    pub endereco_imovel: Option<String>,
    #[serde(rename = "Municipio")]
    pub municipio: Option<String>,
    #[serde(rename = "Estado")]
    pub estado: Option<String>,
    #[serde(rename = "Area_Terreno")]
    pub area_terreno: Option<String>,
    #[serde(rename = "Registro_Anterior")]
    pub registro_anterior: Option<String>,
    #[serde(rename = "Data_Registro")]
    pub data_registro: Option<String>,
    #[serde(rename = "Cartorio")]
    pub cartorio: Option<String>,
    #[serde(rename = "Livro")]
    pub livro: Option<String>,
    #[serde(rename = "Folha")]
    pub folha: Option<String>,
    #[serde(rename = "Observacoes")]
    pub observacoes: Option<String>,
}

impl CertidaoRecord {
    /// Map a model's JSON object onto the fixed field set.
    ///
    /// Keys are looked up as the requested JSON key, then the column name,
    /// then on either ignoring case, accents and space/hyphen/underscore
    /// differences (`Matrícula`, `Endereço Imóvel`). `null`, blank strings and missing
    /// keys become `None`; scalars are rendered as text and nested values as
    /// compact JSON.
    pub fn from_json(value: &Value) -> Result<Self, CoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::NotAnObject(json_kind(value)))?;

        let mut record = Self::default();
        for field in Field::ALL {
            *record.slot_mut(field) = lookup(obj, field).and_then(render_value);
        }
        Ok(record)
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        let slot = match field {
            Field::Matricula => &self.matricula,
            Field::Proprietario => &self.proprietario,
            Field::Cpf => &self.cpf,
            Field::EnderecoImovel => &self.endereco_imovel,
            Field::Municipio => &self.municipio,
            Field::Estado => &self.estado,
            Field::AreaTerreno => &self.area_terreno,
            Field::RegistroAnterior => &self.registro_anterior,
            Field::DataRegistro => &self.data_registro,
            Field::Cartorio => &self.cartorio,
            Field::Livro => &self.livro,
            Field::Folha => &self.folha,
            Field::Observacoes => &self.observacoes,
        };
        slot.as_deref()
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Matricula => &mut self.matricula,
            Field::Proprietario => &mut self.proprietario,
            Field::Cpf => &mut self.cpf,
            Field::EnderecoImovel => &mut self.endereco_imovel,
            Field::Municipio => &mut self.municipio,
            Field::Estado => &mut self.estado,
            Field::AreaTerreno => &mut self.area_terreno,
            Field::RegistroAnterior => &mut self.registro_anterior,
            Field::DataRegistro => &mut self.data_registro,
            Field::Cartorio => &mut self.cartorio,
            Field::Livro => &mut self.livro,
            Field::Folha => &mut self.folha,
            Field::Observacoes => &mut self.observacoes,
        }
    }

    /// Number of fields carrying a value.
    pub fn filled_count(&self) -> usize {
        Field::ALL.iter().filter(|&&f| self.get(f).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_count() == 0
    }
}

fn lookup<'a>(obj: &'a Map<String, Value>, field: Field) -> Option<&'a Value> {
    let exact = [field.json_key(), field.column()]
        .into_iter()
        .filter_map(|key| obj.get(key))
        .find(|v| !v.is_null());
    if exact.is_some() {
        return exact;
    }

    let wanted = [fold_key(field.json_key()), fold_key(field.column())];
    obj.iter()
        .filter(|(k, _)| wanted.contains(&fold_key(k)))
        .map(|(_, v)| v)
        .find(|v| !v.is_null())
}

/// Lowercase, strip diacritics and unify word separators.
fn fold_key(key: &str) -> String {
    key.trim()
        .nfd()
        .filter(|&c| !is_combining_mark(c))
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            // Models sometimes quote the null they were told to use.
            if s.is_empty() || s.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
