// crates/cdo_equation/src/field.rs

//! 场注册表
//!
//! 方程只持有场编号；当前值在求解完成时由离散格式的
//! `update_field` 写入，写入前当前值被复制到前一时刻槽位。

use std::collections::HashMap;

use cdo_mesh::LocationKind;

/// 场编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

impl FieldId {
    /// 序号
    pub fn index(self) -> usize {
        self.0
    }
}

/// 定义在网格位置上的场
#[derive(Debug, Clone)]
pub struct Field {
    /// 名称
    pub name: String,
    /// 分量数
    pub dim: usize,
    /// 所在位置类别
    pub location: LocationKind,
    /// 当前值（分量交错存储）
    pub val: Vec<f64>,
    /// 前一时刻值
    pub val_pre: Option<Vec<f64>>,
}

impl Field {
    /// 元素数量
    pub fn n_elts(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.val.len() / self.dim
        }
    }

    /// 是否保存前一时刻值
    pub fn has_previous(&self) -> bool {
        self.val_pre.is_some()
    }

    /// 当前值复制到前一时刻
    pub fn current_to_previous(&mut self) {
        if let Some(pre) = self.val_pre.as_mut() {
            pre.copy_from_slice(&self.val);
        }
    }
}

/// 场注册表
#[derive(Debug, Default, Clone)]
pub struct FieldRegistry {
    fields: Vec<Field>,
    by_name: HashMap<String, FieldId>,
}

impl FieldRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建场并分配零值；同名场已存在时返回已有编号
    pub fn create_field(
        &mut self,
        name: &str,
        dim: usize,
        location: LocationKind,
        n_elts: usize,
        has_previous: bool,
    ) -> FieldId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = FieldId(self.fields.len());
        let n = dim * n_elts;
        self.fields.push(Field {
            name: name.to_string(),
            dim,
            location,
            val: vec![0.0; n],
            val_pre: has_previous.then(|| vec![0.0; n]),
        });
        self.by_name.insert(name.to_string(), id);
        log::debug!(
            "创建场 {} (dim {}, {} 个 {}, previous = {})",
            name,
            dim,
            n_elts,
            location,
            has_previous
        );
        id
    }

    /// 按编号获取
    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.0)
    }

    /// 按编号获取可变引用
    pub fn get_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.get_mut(id.0)
    }

    /// 按名称查找编号
    pub fn id_by_name(&self, name: &str) -> Option<FieldId> {
        self.by_name.get(name).copied()
    }

    /// 按名称获取
    pub fn by_name(&self, name: &str) -> Option<&Field> {
        self.id_by_name(name).and_then(|id| self.get(id))
    }

    /// 场数量
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
