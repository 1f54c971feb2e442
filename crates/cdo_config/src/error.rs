// crates/cdo_config/src/error.rs

//! 配置期错误类型
//!
//! 所有变体都在设置阶段检测，调用方收到后应终止运行。

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 未识别的键
    #[error("方程 {owner}: 无效键 '{key}'")]
    InvalidKey {
        /// 所属方程或对象名称
        owner: String,
        /// 键名
        key: String,
    },

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 未识别的项名称（link 的 term 参数等）
    #[error("方程 {owner}: 无效关键字 '{keyword}'")]
    InvalidKeyword {
        /// 所属方程名称
        owner: String,
        /// 关键字
        keyword: String,
    },

    /// 参数已锁定
    #[error("方程 {owner}: 参数已锁定，不能再修改 ('{action}')")]
    Locked {
        /// 所属方程名称
        owner: String,
        /// 被拒绝的操作
        action: String,
    },

    /// 未知网格位置
    #[error("无效网格位置 '{0}'")]
    InvalidLocation(String),

    /// 不兼容的组合
    #[error("方程 {owner}: 不兼容的设置 - {reason}")]
    Incompatible {
        /// 所属方程名称
        owner: String,
        /// 原因
        reason: String,
    },

    /// 尚未实现的组合
    #[error("方程 {owner}: 尚未实现 - {feature}")]
    NotImplemented {
        /// 所属方程名称
        owner: String,
        /// 功能描述
        feature: String,
    },

    /// 找不到指定名称的反应项或源项
    #[error("方程 {owner}: 找不到{kind} '{name}'")]
    UnknownTerm {
        /// 所属方程名称
        owner: String,
        /// 项类别（反应项/源项）
        kind: String,
        /// 项名称
        name: String,
    },

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),
}

impl ConfigError {
    /// 构造无效值错误
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 构造不兼容错误
    pub fn incompatible(owner: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Incompatible {
            owner: owner.into(),
            reason: reason.into(),
        }
    }

    /// 构造未实现错误
    pub fn not_implemented(owner: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            owner: owner.into(),
            feature: feature.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
