//! Staged converter
//!
//! Each [`Stage`] owns a fixed instruction template. The converter renders
//! the template around a payload, submits it to a [`Backend`] and shapes the
//! answer: a structured record for report summaries, CSV or Markdown text
//! for the spreadsheet stages.

use crate::backends::Backend;
use crate::error::{BackendError, PipelineError};
use crate::types::{BackendResponse, GenerateRequest, ReportSummary, TaskKind};
use schemars::schema_for;
use serde_json::{Map, Value};

/// Persona for the report summarization stage
const ANALYST_PERSONA: &str = "Você é um especialista em investimentos de longo prazo.";

/// Persona for the spreadsheet stages
const SPREADSHEET_PERSONA: &str = "Você é um especialista em planilhas extremamente meticuloso.";

/// Target column schema of the normalization stage, in order
pub const NORMALIZED_COLUMNS: [&str; 11] = [
    "Posição",
    "Ticker",
    "Empresa",
    "Setor",
    "Preço de Entrada (R$)",
    "Preço Atual (R$)",
    "Preço Teto (R$)",
    "Peso na Carteira (%)",
    "Rentabilidade (%)",
    "Dividend Yield (%)",
    "Recomendação",
];

/// Literal classification column added by the normalization stage
pub const WALLET_TYPE_COLUMN: &str = "Tipo Carteira";

/// Column dropped by the table extraction stage
pub const EXCLUDED_COLUMN: &str = "Ativo";

/// A conversion stage with its fixed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// HTML report → classified Markdown summary (structured record)
    ReportSummary,
    /// HTML wallet → Markdown document with fenced CSV blocks
    TableExtraction,
    /// Markdown tables → CSV with the normalized column schema
    ColumnNormalization,
    /// HTML portfolio table → `;`-separated CSV
    SpreadsheetConversion,
}

impl Stage {
    /// Task kind, used to pick backend defaults
    pub fn kind(&self) -> TaskKind {
        match self {
            Stage::ReportSummary => TaskKind::Analysis,
            _ => TaskKind::Spreadsheet,
        }
    }

    /// System prompt for this stage
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Stage::ReportSummary => ANALYST_PERSONA,
            _ => SPREADSHEET_PERSONA,
        }
    }

    /// Render the instruction around a payload
    ///
    /// `source_name` is the input file name; only the normalization stage uses it.
    pub fn render(&self, source_name: &str, payload: &str) -> String {
        match self {
            Stage::ReportSummary => format!(
                "{persona} Receberá a seguir um relatório em HTML.\n\n\
                 **TAREFA**:\n\
                 1. Apenas se o relatório não for o \"radar-fii\" (que tem uma extensa lista de FIIs e seus índices), verifique se o relatório contém recomendação de COMPRA, VENDA ou AJUSTE DE CARTEIRA de algum ativo.\n\
                 2. Caso contenha, liste (em Markdown), para cada ativo:\n\
                 - Nome do ativo\n\
                 - Se é compra, venda ou ajuste\n\
                 - Preço-teto (se houver)\n\
                 - Percentual de alocação (se houver)\n\
                 - Curta justificativa\n\
                 3. Se não houver nenhuma recomendação (ou for o \"radar-fii\"), apresente apenas um resumo sucinto do conteúdo (em Markdown), enfatizando o que for relevante para investimentos de longo prazo.\n\
                 4. Evite adjetivos em excesso.\n\
                 5. Retorne JSON com as chaves \"fileNamePrefix\" (\"com-recomendacao\" ou \"sem-recomendacao\") e \"result\" (markdown), conforme o schema:\n\
                 {schema}\n\n\
                 **RELATÓRIO (HTML)**:\n{payload}",
                persona = ANALYST_PERSONA,
                schema = summary_schema(),
                payload = payload,
            ),
            Stage::TableExtraction => format!(
                "- {persona} Receberá a seguir um relatório em HTML que contém dados tabulares.\n\
                 - Analise o conteúdo e organize as informações relevantes em um ou mais blocos CSV.\n\
                 - Retorne SOMENTE o texto em formato Markdown (.md), contendo as tabelas CSV em blocos ```csv.\n\
                 - Se precisar de mais de um CSV, separe-os com um título.\n\
                 - Ignore colunas sem dados.\n\
                 - Ignore a coluna \"{excluded}\".\n\n\
                 Relatório (HTML):\n{payload}",
                persona = SPREADSHEET_PERSONA,
                excluded = EXCLUDED_COLUMN,
                payload = payload,
            ),
            Stage::ColumnNormalization => format!(
                "Você receberá um arquivo `.md` contendo tabelas em formato CSV.\n\
                 Nome do arquivo: {source_name}\n\
                 Sua tarefa é **extrair exclusivamente a tabela principal da carteira de ativos** e **padronizar os nomes das colunas**.\n\n\
                 1. Identifique a tabela correta.\n\
                 2. Padronize as colunas para: {columns}.\n\
                 3. Mantenha a formatação CSV (separado por , ou ; conforme o padrão do arquivo).\n\
                 4. Insira a coluna '{wallet_type}' com o tipo da carteira deduzido do nome do arquivo.\n\
                 5. Retorne APENAS a tabela CSV.\n\n\
                 Conteúdo:\n{payload}",
                source_name = source_name,
                columns = NORMALIZED_COLUMNS.join(", "),
                wallet_type = WALLET_TYPE_COLUMN,
                payload = payload,
            ),
            Stage::SpreadsheetConversion => format!(
                "- {persona} Receberá a seguir uma planilha em HTML.\n\
                 - Converta para CSV separado por ponto e vírgula (;).\n\
                 - Mantenha os títulos.\n\
                 - Retorne APENAS o CSV.\n\n\
                 Planilha (HTML):\n{payload}",
                persona = SPREADSHEET_PERSONA,
                payload = payload,
            ),
        }
    }
}

/// JSON schema of [`ReportSummary`], pretty-printed for the instruction
fn summary_schema() -> String {
    serde_json::to_string_pretty(&schema_for!(ReportSummary)).unwrap_or_default()
}

/// Submits stage instructions to a backend and shapes the answers
pub struct StagedConverter {
    backend: Box<dyn Backend>,
}

impl StagedConverter {
    /// Create a converter over a backend
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Name of the underlying backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Build the request a stage would submit for a payload
    pub fn request(&self, stage: Stage, source_name: &str, payload: &str) -> GenerateRequest {
        GenerateRequest {
            system: stage.system_prompt().to_string(),
            instruction: stage.render(source_name, payload),
            options: self.backend.default_options(stage.kind()),
        }
    }

    /// Run a stage, returning a structured record when one can be recovered
    ///
    /// Parsing never fails: when no JSON object is found the raw text comes back.
    pub async fn convert(
        &self,
        stage: Stage,
        source_name: &str,
        payload: &str,
    ) -> Result<BackendResponse, BackendError> {
        let request = self.request(stage, source_name, payload);
        let text = self.backend.generate(&request).await?;

        if !request.options.structured {
            return Ok(BackendResponse::Text(text));
        }

        let record = if self.backend.supports_structured_output() {
            parse_json_object(&text).or_else(|| {
                tracing::debug!(
                    backend = self.backend.name(),
                    "Native structured answer did not parse, extracting braces"
                );
                extract_braced(&text)
            })
        } else {
            extract_braced(&text)
        };

        match record {
            Some(record) => Ok(BackendResponse::Structured(record)),
            None => {
                tracing::warn!(
                    backend = self.backend.name(),
                    source = source_name,
                    "No JSON object in structured response"
                );
                Ok(BackendResponse::Text(text))
            }
        }
    }

    /// Summarize and classify an HTML report
    pub async fn summarize_report(
        &self,
        source_name: &str,
        html: &str,
    ) -> Result<ReportSummary, PipelineError> {
        match self.convert(Stage::ReportSummary, source_name, html).await? {
            BackendResponse::Structured(record) => Ok(ReportSummary::from_record(&record)),
            BackendResponse::Text(text) => Err(PipelineError::MalformedResponse(excerpt(&text))),
        }
    }

    /// Extract tables from an HTML wallet into a Markdown document
    pub async fn extract_tables(
        &self,
        source_name: &str,
        html: &str,
    ) -> Result<String, PipelineError> {
        Ok(self.text(Stage::TableExtraction, source_name, html).await?)
    }

    /// Normalize the main wallet table of a Markdown document into CSV
    pub async fn normalize_columns(
        &self,
        source_name: &str,
        markdown: &str,
    ) -> Result<String, PipelineError> {
        let text = self
            .text(Stage::ColumnNormalization, source_name, markdown)
            .await?;
        Ok(strip_code_fence(&text))
    }

    /// Convert an HTML portfolio table into `;`-separated CSV
    pub async fn convert_spreadsheet(
        &self,
        source_name: &str,
        html: &str,
    ) -> Result<String, PipelineError> {
        let text = self
            .text(Stage::SpreadsheetConversion, source_name, html)
            .await?;
        Ok(strip_code_fence(&text))
    }

    async fn text(
        &self,
        stage: Stage,
        source_name: &str,
        payload: &str,
    ) -> Result<String, BackendError> {
        match self.convert(stage, source_name, payload).await? {
            BackendResponse::Text(text) => Ok(text),
            BackendResponse::Structured(record) => Ok(Value::Object(record).to_string()),
        }
    }
}

/// Recover a JSON object from backend text
///
/// Tries the whole text first, then the span from the first `{` to the last `}`.
pub fn parse_structured(text: &str) -> Option<Map<String, Value>> {
    parse_json_object(text).or_else(|| extract_braced(text))
}

fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    serde_json::from_str::<Map<String, Value>>(text.trim()).ok()
}

/// Parse the span from the first `{` to the last `}`
fn extract_braced(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Map<String, Value>>(&text[start..=end]).ok()
}

/// Strip a leading ```` ``` ````/```` ```csv ```` fence line and a trailing fence, then trim
pub fn strip_code_fence(text: &str) -> String {
    let mut body = text.trim();

    if let Some(after) = body.strip_prefix("```") {
        body = match after.find('\n') {
            Some(newline) if !after[..newline].contains('`') => &after[newline + 1..],
            _ => after,
        };
    }

    if let Some(before) = body.trim_end().strip_suffix("```") {
        body = before;
    }

    body.trim().to_string()
}

/// First characters of a response, for error messages
fn excerpt(text: &str) -> String {
    const LIMIT: usize = 200;
    let mut out: String = text.chars().take(LIMIT).collect();
    if text.chars().count() > LIMIT {
        out.push('…');
    }
    out
}
