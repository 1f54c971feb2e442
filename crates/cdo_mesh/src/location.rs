// crates/cdo_mesh/src/location.rs

//! 网格位置注册表
//!
//! 名称 → 编号查找。预定义位置 `cells`、`interior_faces`、`boundary_faces`、
//! `vertices` 覆盖全部对应实体；笛卡尔网格另注册六个边界面组。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{MeshError, MeshResult};

/// 位置类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// 单元
    Cells,
    /// 内部面
    InteriorFaces,
    /// 边界面
    BoundaryFaces,
    /// 顶点
    Vertices,
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cells => "cells",
            Self::InteriorFaces => "interior_faces",
            Self::BoundaryFaces => "boundary_faces",
            Self::Vertices => "vertices",
        };
        f.write_str(s)
    }
}

/// 单个网格位置
///
/// `elements` 为 None 表示该类别的全部实体。面的编号为全局面编号。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshLocation {
    /// 名称
    pub name: String,
    /// 类别
    pub kind: LocationKind,
    /// 元素子集
    pub elements: Option<Vec<usize>>,
}

/// 网格位置注册表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshLocations {
    locations: Vec<MeshLocation>,
    by_name: HashMap<String, usize>,
}

impl MeshLocations {
    /// 创建只含四个预定义位置的注册表
    pub fn with_predefined() -> Self {
        let mut reg = Self::default();
        for kind in [
            LocationKind::Cells,
            LocationKind::InteriorFaces,
            LocationKind::BoundaryFaces,
            LocationKind::Vertices,
        ] {
            reg.push(MeshLocation {
                name: kind.to_string(),
                kind,
                elements: None,
            });
        }
        reg
    }

    fn push(&mut self, loc: MeshLocation) -> usize {
        let id = self.locations.len();
        self.by_name.insert(loc.name.clone(), id);
        self.locations.push(loc);
        id
    }

    /// 注册新位置
    pub fn add(
        &mut self,
        name: &str,
        kind: LocationKind,
        elements: Option<Vec<usize>>,
    ) -> MeshResult<usize> {
        if self.by_name.contains_key(name) {
            return Err(MeshError::DuplicateLocation(name.to_string()));
        }
        let elements = elements.map(|mut e| {
            e.sort_unstable();
            e.dedup();
            e
        });
        let id = self.push(MeshLocation {
            name: name.to_string(),
            kind,
            elements,
        });
        log::debug!("注册网格位置 {} ({}), id = {}", name, kind, id);
        Ok(id)
    }

    /// 按名称查找编号
    pub fn id_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// 按名称查找编号，失败时返回 `InvalidLocation`
    pub fn require(&self, name: &str) -> MeshResult<usize> {
        self.id_by_name(name)
            .ok_or_else(|| MeshError::InvalidLocation(name.to_string()))
    }

    /// 按编号获取
    pub fn get(&self, id: usize) -> Option<&MeshLocation> {
        self.locations.get(id)
    }

    /// 已注册的位置数
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// 所有位置名称（按编号顺序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.locations.iter().map(|l| l.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_names() {
        let reg = MeshLocations::with_predefined();
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.id_by_name("cells"), Some(0));
        assert_eq!(reg.id_by_name("vertices"), Some(3));
        assert!(reg.id_by_name("walls").is_none());
    }

    #[test]
    fn test_add_sorts_and_rejects_duplicates() {
        let mut reg = MeshLocations::with_predefined();
        let id = reg.add("probe", LocationKind::Vertices, Some(vec![5, 1, 5])).unwrap();
        assert_eq!(reg.get(id).unwrap().elements.as_deref(), Some(&[1, 5][..]));
        assert!(matches!(
            reg.add("probe", LocationKind::Cells, None),
            Err(MeshError::DuplicateLocation(_))
        ));
    }

    #[test]
    fn test_require_reports_invalid_location() {
        let reg = MeshLocations::with_predefined();
        let err = reg.require("nowhere").unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }
}
