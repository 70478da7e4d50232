//! # Activity Extraction
//!
//! Turns a free-text description of a work day into validated
//! [`ExtractedActivity`] records using a hosted language model.

use async_trait::async_trait;

use crate::errors::ExtractionError;
use crate::models::ExtractedActivity;

pub mod api_types;
pub mod client;
pub mod parsing;

pub use client::{GeminiClient, GeminiConfig};
pub use parsing::{extract_json, parse_activities};

/// Instruction sent ahead of the user's text
pub const SYSTEM_PROMPT: &str = r#"Eres un asistente que convierte descripciones informales de trabajo en registros profesionales.

Analiza el siguiente texto y extrae TODAS las actividades mencionadas. Para cada actividad:
- Descripción profesional y clara
- Proyecto asociado (infiere del contexto)
- Categoría: 'proyectoFacturable', 'proyectoNoFacturable', 'otrosNoFacturable'
- Horas estimadas (si no está explícito, estima razonablemente, un día debe tener OBLIGATORIAMENTE 8 horas de actividades)

RESPONDE ÚNICAMENTE con un JSON válido:
{
  "actividades": [
    {
      "descripcion": "...",
      "proyecto": "...",
      "categoria": "...",
      "horas_estimadas": 2.5
    }
  ]
}"#;

/// Full prompt for one user submission
pub fn build_prompt(user_text: &str) -> String {
    format!("{SYSTEM_PROMPT}\n\nTexto del usuario: {user_text}")
}

/// Anything that can turn free text into activities
#[async_trait]
pub trait ActivityExtractor: Send + Sync {
    /// Returns a non-empty, validated list or a classified error.
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedActivity>, ExtractionError>;
}
