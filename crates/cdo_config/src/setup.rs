// crates/cdo_config/src/setup.rs

//! EquationSetup - 方程设置脚本
//!
//! 以 JSON 记录一条方程的设置调用序列：选项键值、项关联、初始条件、
//! 边界条件、反应项与源项。脚本中只能描述常数定义，
//! 解析函数与数组定义需要在代码中设置。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// 方程设置脚本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquationSetup {
    /// 方程名称
    pub name: String,

    /// 关联变量（场）名称
    pub varname: String,

    /// 方程类型：user / predefined / groundwater
    #[serde(default = "default_equation_type")]
    pub equation_type: String,

    /// 变量类型：scalar / vector / tensor
    #[serde(default = "default_var_type")]
    pub var_type: String,

    /// 默认边界条件：zero_value / zero_flux
    #[serde(default = "default_bc")]
    pub default_bc: String,

    /// 选项键值，按顺序回放
    #[serde(default)]
    pub options: Vec<OptionEntry>,

    /// 项关联
    #[serde(default)]
    pub links: Vec<LinkEntry>,

    /// 初始条件
    #[serde(default)]
    pub initial_conditions: Vec<InitialConditionEntry>,

    /// 边界条件
    #[serde(default)]
    pub boundary_conditions: Vec<BoundaryConditionEntry>,

    /// 反应项
    #[serde(default)]
    pub reactions: Vec<ReactionEntry>,

    /// 源项
    #[serde(default)]
    pub source_terms: Vec<SourceTermEntry>,
}

fn default_equation_type() -> String { "user".to_string() }
fn default_var_type() -> String { "scalar".to_string() }
fn default_bc() -> String { "zero_value".to_string() }

/// 单个选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    /// 键
    pub key: String,
    /// 值
    pub value: String,
}

impl OptionEntry {
    /// 构造选项
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 项关联：diffusion / time 关联物性，advection 关联对流场
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// 项名称
    pub term: String,
    /// 物性或对流场名称
    pub name: String,
}

/// 常数初始条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialConditionEntry {
    /// 网格位置，缺省时按离散格式取 vertices 或 cells
    #[serde(default)]
    pub location: Option<String>,
    /// 常数值
    pub value: f64,
}

/// 常数边界条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConditionEntry {
    /// 网格位置名称
    pub location: String,
    /// dirichlet / neumann / robin
    pub kind: String,
    /// 分量值
    pub value: Vec<f64>,
}

/// 线性反应项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEntry {
    /// 名称，缺省时自动命名
    #[serde(default)]
    pub name: Option<String>,
    /// 反应类型，目前只有 linear
    #[serde(default = "default_reaction_kind")]
    pub kind: String,
    /// 物性名称
    pub property: String,
    /// 反应项选项
    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

fn default_reaction_kind() -> String { "linear".to_string() }

/// 常数源项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTermEntry {
    /// 名称，缺省时自动命名
    #[serde(default)]
    pub name: Option<String>,
    /// 网格位置名称
    pub location: String,
    /// 分量值
    pub value: Vec<f64>,
    /// 源项选项
    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

impl EquationSetup {
    /// 创建只有名称的空脚本
    pub fn new(name: impl Into<String>, varname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            varname: varname.into(),
            equation_type: default_equation_type(),
            var_type: default_var_type(),
            default_bc: default_bc(),
            options: Vec::new(),
            links: Vec::new(),
            initial_conditions: Vec::new(),
            boundary_conditions: Vec::new(),
            reactions: Vec::new(),
            source_terms: Vec::new(),
        }
    }

    /// 追加一个选项
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(OptionEntry::new(key, value));
        self
    }

    /// 从 JSON 文本解析
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let setup: EquationSetup = serde_json::from_str(content)?;
        setup.validate()?;
        Ok(setup)
    }

    /// 从文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("加载方程设置: {}", path.as_ref().display());
        Self::from_json(&content)
    }

    /// 验证脚本结构
    ///
    /// 只检查结构完整性；键和值的合法性在回放时由参数接口判断。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing("name".to_string()));
        }
        if self.varname.trim().is_empty() {
            return Err(ConfigError::Missing("varname".to_string()));
        }
        if let Some(opt) = self.options.iter().find(|o| o.key.trim().is_empty()) {
            return Err(ConfigError::invalid_value("options", &opt.value, "键为空"));
        }
        for bc in &self.boundary_conditions {
            if bc.value.is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("boundary_conditions[{}]", bc.location),
                    "[]",
                    "至少需要一个分量",
                ));
            }
        }
        for st in &self.source_terms {
            if st.value.is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("source_terms[{}]", st.location),
                    "[]",
                    "至少需要一个分量",
                ));
            }
        }
        Ok(())
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POISSON: &str = r#"{
        "name": "poisson",
        "varname": "pot",
        "options": [
            {"key": "space_scheme", "value": "cdo_vb"},
            {"key": "itsol", "value": "cg"}
        ],
        "links": [{"term": "diffusion", "name": "unity"}],
        "boundary_conditions": [
            {"location": "boundary_faces", "kind": "dirichlet", "value": [0.0]}
        ],
        "source_terms": [{"location": "cells", "value": [1.0]}]
    }"#;

    #[test]
    fn test_defaults_filled() {
        let setup = EquationSetup::from_json(POISSON).unwrap();
        assert_eq!(setup.equation_type, "user");
        assert_eq!(setup.var_type, "scalar");
        assert_eq!(setup.default_bc, "zero_value");
        assert_eq!(setup.options.len(), 2);
        assert!(setup.source_terms[0].name.is_none());
    }

    #[test]
    fn test_missing_name_rejected() {
        let setup = EquationSetup::new("", "pot");
        assert!(matches!(setup.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_empty_bc_value_rejected() {
        let mut setup = EquationSetup::new("eq", "u");
        setup.boundary_conditions.push(BoundaryConditionEntry {
            location: "xmin".into(),
            kind: "dirichlet".into(),
            value: vec![],
        });
        assert!(setup.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eq.json");
        let setup = EquationSetup::new("heat", "t").with_option("time_scheme", "crank_nicolson");
        setup.save_to_file(&path).unwrap();
        let loaded = EquationSetup::from_file(&path).unwrap();
        assert_eq!(loaded.name, "heat");
        assert_eq!(loaded.options, setup.options);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(
            EquationSetup::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
