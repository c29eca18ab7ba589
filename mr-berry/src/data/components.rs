//! 3D 6-连通域提取.

use std::collections::{HashSet, VecDeque};

use super::MrMask;
use crate::consts::gray::*;
use crate::{Area3d, Areas3d, Predicate};

impl MrMask {
    /// 按照 6-相邻规则 (钻石邻域) 获取所有区域. 两个体素 `p1` 和 `p2`
    /// 属于同一个区域, 当且仅当存在一条从 `p1` 到 `p2` 的 6-相邻路径,
    /// 且路径上的所有体素 (包括 `p1` 和 `p2`) 都满足谓词 `pred`.
    ///
    /// 区域之间按行优先发现顺序排列, 区域内部体素按 BFS 访问顺序排列.
    pub fn areas(&self, pred: Predicate) -> Areas3d {
        let mut ans = Areas3d::with_capacity(1);
        let mut bfs_q = VecDeque::with_capacity(8);
        let mut set = HashSet::with_capacity(16);

        for (pos, &pixel) in self.data().indexed_iter() {
            if set.contains(&pos) || !pred(pixel) {
                continue;
            }
            bfs_q.push_back(pos);
            let mut this_area = Area3d::with_capacity(1);
            while !bfs_q.is_empty() {
                let cur_pos = bfs_q.pop_front().unwrap();
                if set.contains(&cur_pos) {
                    continue;
                }
                set.insert(cur_pos);
                this_area.push(cur_pos);

                // bfs
                bfs_q.extend(
                    self.diamond_neighbours(cur_pos)
                        .into_iter()
                        .filter(|neigh| pred(self[*neigh]) && !set.contains(neigh)),
                );
            }
            ans.push(this_area);
        }
        ans
    }

    /// 按照 6-相邻原则获得标注中所有前景 (非零) 区域.
    #[inline]
    pub fn foreground_areas(&self) -> Areas3d {
        self.areas(is_foreground)
    }

    /// 按照 6-相邻原则获得标注中所有病灶区域.
    #[inline]
    pub fn lesion_areas(&self) -> Areas3d {
        self.areas(is_lesion)
    }
}
