// crates/cdo_mesh/src/connect.rs

//! 网格邻接关系
//!
//! 所有一对多关系采用压缩格式（offsets + ids），与 CSR 行索引一致。
//! 有向关系（单元→面、边→顶点）额外保存 ±1 符号。

use serde::{Deserialize, Serialize};

/// 压缩邻接表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Adjacency {
    offsets: Vec<usize>,
    ids: Vec<usize>,
    signs: Vec<i8>,
}

impl Adjacency {
    /// 从每行列表构建（无符号）
    pub fn from_rows(rows: &[Vec<usize>]) -> Self {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        let mut ids = Vec::new();
        for row in rows {
            ids.extend_from_slice(row);
            offsets.push(ids.len());
        }
        Self {
            offsets,
            ids,
            signs: Vec::new(),
        }
    }

    /// 从每行 (id, 符号) 列表构建
    pub fn from_signed_rows(rows: &[Vec<(usize, i8)>]) -> Self {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        let mut ids = Vec::new();
        let mut signs = Vec::new();
        for row in rows {
            for &(id, s) in row {
                ids.push(id);
                signs.push(s);
            }
            offsets.push(ids.len());
        }
        Self { offsets, ids, signs }
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// 第 i 行的全局起始位置
    #[inline]
    pub fn start(&self, i: usize) -> usize {
        self.offsets[i]
    }

    /// 第 i 行
    #[inline]
    pub fn row(&self, i: usize) -> &[usize] {
        &self.ids[self.offsets[i]..self.offsets[i + 1]]
    }

    /// 第 i 行的符号，无符号邻接返回空切片
    #[inline]
    pub fn row_signs(&self, i: usize) -> &[i8] {
        if self.signs.is_empty() {
            &[]
        } else {
            &self.signs[self.offsets[i]..self.offsets[i + 1]]
        }
    }

    /// 总条目数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.ids.len()
    }

    /// 转置，得到反向邻接（行内升序）
    pub fn transpose(&self, n_cols: usize) -> Self {
        let mut rows = vec![Vec::new(); n_cols];
        for i in 0..self.n_rows() {
            for &j in self.row(i) {
                rows[j].push(i);
            }
        }
        Self::from_rows(&rows)
    }
}

/// CDO 邻接关系集合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdoConnect {
    /// 单元 → 顶点（每单元 8 个，局部编号 a + 2b + 4c）
    pub c2v: Adjacency,
    /// 单元 → 边（每单元 12 个：4 条 x 边、4 条 y 边、4 条 z 边）
    pub c2e: Adjacency,
    /// 单元 → 面，符号为 +1 表示面法向指向单元外
    pub c2f: Adjacency,
    /// 面 → 顶点
    pub f2v: Adjacency,
    /// 边 → 顶点，符号 -1 为起点、+1 为终点
    pub e2v: Adjacency,
    /// 顶点 → 相邻顶点（经由边）
    pub v2v: Adjacency,
    /// 顶点 → 单元
    pub v2c: Adjacency,
    /// 面两侧单元：(owner, neighbor)，边界面 neighbor 为 None
    pub f2c: Vec<(usize, Option<usize>)>,
    /// 顶点是否位于边界
    pub v_on_boundary: Vec<bool>,
}

impl CdoConnect {
    /// 边的两个端点（起点，终点）
    #[inline]
    pub fn edge_vertices(&self, e: usize) -> (usize, usize) {
        let row = self.e2v.row(e);
        (row[0], row[1])
    }

    /// 面是否为边界面
    #[inline]
    pub fn is_boundary_face(&self, f: usize) -> bool {
        self.f2c[f].1.is_none()
    }

    /// 单元中局部顶点序号
    pub fn local_vertex(&self, c: usize, v: usize) -> Option<usize> {
        self.c2v.row(c).iter().position(|&x| x == v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_and_transpose() {
        let adj = Adjacency::from_rows(&[vec![0, 2], vec![1], vec![]]);
        assert_eq!(adj.n_rows(), 3);
        assert_eq!(adj.row(0), &[0, 2]);
        assert!(adj.row(2).is_empty());
        assert!(adj.row_signs(0).is_empty());

        let t = adj.transpose(3);
        assert_eq!(t.row(0), &[0]);
        assert_eq!(t.row(1), &[1]);
        assert_eq!(t.row(2), &[0]);
    }

    #[test]
    fn test_signed_rows() {
        let adj = Adjacency::from_signed_rows(&[vec![(3, -1), (4, 1)]]);
        assert_eq!(adj.row(0), &[3, 4]);
        assert_eq!(adj.row_signs(0), &[-1, 1]);
        assert_eq!(adj.nnz(), 2);
    }
}
