// crates/cdo_equation/src/property.rs

//! 物性与对流场注册表
//!
//! 方程参数只按名称引用物性，构建离散系统时从 [`PropertyRegistry`]
//! 取出副本。预定义物性 `unity` 恒为 1。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use glam::DVec3;

/// 物性的定义方式
#[derive(Clone)]
pub enum PropertyDef {
    /// 均匀值
    Uniform(f64),
    /// 空间函数
    Analytic(Arc<dyn Fn(DVec3) -> f64 + Send + Sync>),
    /// 每单元一个值
    ByCells(Arc<[f64]>),
}

/// 标量物性（扩散系数、密度、反应系数）
#[derive(Clone)]
pub struct Property {
    name: String,
    def: PropertyDef,
}

impl Property {
    /// 均匀物性
    pub fn uniform(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            def: PropertyDef::Uniform(value),
        }
    }

    /// 函数定义的物性
    pub fn analytic<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(DVec3) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            def: PropertyDef::Analytic(Arc::new(f)),
        }
    }

    /// 逐单元定义的物性
    pub fn by_cells(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            def: PropertyDef::ByCells(values.into()),
        }
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 定义
    pub fn def(&self) -> &PropertyDef {
        &self.def
    }

    /// 是否均匀
    pub fn is_uniform(&self) -> bool {
        matches!(self.def, PropertyDef::Uniform(_))
    }

    /// 单元 `c`（中心 `xc`）上的值
    pub fn value_in_cell(&self, c: usize, xc: DVec3) -> f64 {
        match &self.def {
            PropertyDef::Uniform(v) => *v,
            PropertyDef::Analytic(f) => f(xc),
            PropertyDef::ByCells(a) => a.get(c).copied().unwrap_or(0.0),
        }
    }

    /// 单元值，`inv` 为真时取倒数
    pub fn cell_value(&self, c: usize, xc: DVec3, inv: bool) -> f64 {
        let v = self.value_in_cell(c, xc);
        if inv && v != 0.0 {
            1.0 / v
        } else {
            v
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.def {
            PropertyDef::Uniform(v) => format!("uniform({})", v),
            PropertyDef::Analytic(_) => "analytic".to_string(),
            PropertyDef::ByCells(a) => format!("by_cells(len = {})", a.len()),
        };
        write!(f, "Property({}: {})", self.name, kind)
    }
}

/// 对流速度场
#[derive(Clone)]
pub struct AdvectionField {
    name: String,
    def: AdvectionDef,
}

#[derive(Clone)]
enum AdvectionDef {
    Uniform(DVec3),
    Analytic(Arc<dyn Fn(DVec3) -> DVec3 + Send + Sync>),
}

impl AdvectionField {
    /// 均匀速度场
    pub fn uniform(name: impl Into<String>, velocity: DVec3) -> Self {
        Self {
            name: name.into(),
            def: AdvectionDef::Uniform(velocity),
        }
    }

    /// 函数定义的速度场
    pub fn analytic<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(DVec3) -> DVec3 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            def: AdvectionDef::Analytic(Arc::new(f)),
        }
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 点 `x` 处的速度
    pub fn value_at(&self, x: DVec3) -> DVec3 {
        match &self.def {
            AdvectionDef::Uniform(v) => *v,
            AdvectionDef::Analytic(f) => f(x),
        }
    }
}

impl fmt::Debug for AdvectionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.def {
            AdvectionDef::Uniform(v) => write!(f, "AdvectionField({}: uniform {:?})", self.name, v),
            AdvectionDef::Analytic(_) => write!(f, "AdvectionField({}: analytic)", self.name),
        }
    }
}

/// 物性与对流场注册表
#[derive(Debug, Clone)]
pub struct PropertyRegistry {
    properties: HashMap<String, Property>,
    adv_fields: HashMap<String, AdvectionField>,
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyRegistry {
    /// 创建，预置 `unity`
    pub fn new() -> Self {
        let mut reg = Self {
            properties: HashMap::new(),
            adv_fields: HashMap::new(),
        };
        reg.add_property(Property::uniform("unity", 1.0));
        reg
    }

    /// 注册物性，同名时覆盖
    pub fn add_property(&mut self, property: Property) {
        log::debug!("注册物性 {:?}", property);
        self.properties.insert(property.name.clone(), property);
    }

    /// 注册对流场，同名时覆盖
    pub fn add_advection_field(&mut self, field: AdvectionField) {
        log::debug!("注册对流场 {:?}", field);
        self.adv_fields.insert(field.name.clone(), field);
    }

    /// 按名称查找物性
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// 按名称查找对流场
    pub fn advection_field(&self, name: &str) -> Option<&AdvectionField> {
        self.adv_fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_predefined() {
        let reg = PropertyRegistry::new();
        let p = reg.property("unity").unwrap();
        assert!(p.is_uniform());
        assert_eq!(p.value_in_cell(3, DVec3::ZERO), 1.0);
    }

    #[test]
    fn test_property_variants() {
        let x = DVec3::new(2.0, 0.0, 0.0);
        assert_eq!(Property::analytic("k", |p| p.x * 3.0).value_in_cell(0, x), 6.0);
        let by = Property::by_cells("s", vec![1.0, 4.0]);
        assert_eq!(by.value_in_cell(1, x), 4.0);
        assert_eq!(by.cell_value(1, x, true), 0.25);
    }

    #[test]
    fn test_advection_lookup() {
        let mut reg = PropertyRegistry::new();
        reg.add_advection_field(AdvectionField::uniform("beta", DVec3::X));
        assert_eq!(reg.advection_field("beta").unwrap().value_at(DVec3::ZERO), DVec3::X);
        assert!(reg.advection_field("gamma").is_none());
    }
}
