use serde::{Deserialize, Serialize};

use crate::errors::ParameterError;

/// 几何参数，字段名沿用配置记录中的键（`W`、`LS`）。
///
/// 输入允许数字或数字字符串；其余取值视为缺失，由 [`RailSpec::resolve`] 填入缺省值。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryParams {
    #[serde(
        rename = "W",
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub rail_width: Option<f64>,
    #[serde(
        rename = "LS",
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub rail_length: Option<f64>,
}

/// 应用参数（`NOB`、`PN`、`ST`）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationParams {
    #[serde(
        rename = "NOB",
        default,
        deserialize_with = "lenient::integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub num_blocks: Option<i64>,
    #[serde(
        rename = "PN",
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub part_number: Option<String>,
    /// 表面处理，目前不参与布局，仅随规格传递。
    #[serde(
        rename = "ST",
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub surface_treatment: Option<String>,
}

/// 参数缺失时使用的缺省值。
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingDefaults {
    pub rail_width: f64,
    pub rail_length: f64,
    pub num_blocks: u32,
    /// 滑块数量上限，超出即拒绝出图。
    pub max_blocks: u32,
    /// 缺省零件号前缀，零件号形如 `<prefix>-<configId>`。
    pub part_prefix: String,
}

impl Default for DrawingDefaults {
    fn default() -> Self {
        Self {
            rail_width: 20.0,
            rail_length: 500.0,
            num_blocks: 2,
            max_blocks: 1000,
            part_prefix: "SKF".to_string(),
        }
    }
}

/// 缺省值替换并校验后的出图规格。
#[derive(Debug, Clone, PartialEq)]
pub struct RailSpec {
    pub config_id: u64,
    pub rail_width: f64,
    pub rail_length: f64,
    pub num_blocks: usize,
    pub part_number: String,
    pub surface_treatment: Option<String>,
}

impl RailSpec {
    pub fn resolve(
        config_id: u64,
        geometry: &GeometryParams,
        application: Option<&ApplicationParams>,
        defaults: &DrawingDefaults,
    ) -> Result<Self, ParameterError> {
        let rail_width = geometry.rail_width.unwrap_or(defaults.rail_width);
        if !rail_width.is_finite() || rail_width <= 0.0 {
            return Err(ParameterError::InvalidRailWidth(rail_width));
        }
        let rail_length = geometry.rail_length.unwrap_or(defaults.rail_length);
        if !rail_length.is_finite() || rail_length <= 0.0 {
            return Err(ParameterError::InvalidRailLength(rail_length));
        }

        let application = application.cloned().unwrap_or_default();
        let requested_blocks = application
            .num_blocks
            .unwrap_or(i64::from(defaults.num_blocks));
        if requested_blocks < 0 {
            return Err(ParameterError::NegativeBlockCount(requested_blocks));
        }
        if requested_blocks > i64::from(defaults.max_blocks) {
            return Err(ParameterError::TooManyBlocks {
                requested: requested_blocks,
                max: defaults.max_blocks,
            });
        }
        let num_blocks = usize::try_from(requested_blocks).map_err(|_| {
            ParameterError::TooManyBlocks {
                requested: requested_blocks,
                max: defaults.max_blocks,
            }
        })?;

        let part_number = application
            .part_number
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| format!("{}-{config_id}", defaults.part_prefix));

        Ok(Self {
            config_id,
            rail_width,
            rail_length,
            num_blocks,
            part_number,
            surface_treatment: application.surface_treatment,
        })
    }
}

/// 宽松的字段解析：上游记录来自 JSON，数值可能以字符串形式出现。
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::debug;

    pub(super) fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(number) => number.as_f64(),
            Value::String(raw) => parse_or_ignore(&raw, |s| s.parse::<f64>().ok()),
            Value::Null => None,
            other => ignore(&other),
        })
    }

    pub(super) fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(number) => number.as_i64().or_else(|| {
                number
                    .as_f64()
                    .filter(|value| value.is_finite())
                    .map(|value| value.trunc() as i64)
            }),
            Value::String(raw) => parse_or_ignore(&raw, |s| s.parse::<i64>().ok()),
            Value::Null => None,
            other => ignore(&other),
        })
    }

    pub(super) fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(raw) => Some(raw),
            Value::Number(number) => Some(number.to_string()),
            Value::Null => None,
            other => ignore(&other),
        })
    }

    fn parse_or_ignore<T>(raw: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let parsed = parse(raw.trim());
        if parsed.is_none() {
            debug!(value = raw, "参数无法解析为数值，按缺失处理");
        }
        parsed
    }

    fn ignore<T>(value: &Value) -> Option<T> {
        debug!(%value, "参数类型不受支持，按缺失处理");
        None
    }
}
