//! 分割质量评估.
//!
//! 全部指标在成对的二值掩膜上定义: `truth` 为专家标注, `prediction`
//! 为模型预测, 任何非零体素都视作病灶前景. 一对掩膜的形状必须一致,
//! 否则 panic.

use crate::consts::gray::{is_background, is_foreground};
use crate::{Idx3d, MrMask, NiftiHeaderAttr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一对掩膜的体素级混淆计数.
#[derive(Default, Clone, Copy, Debug)]
struct Confusion {
    true_pos: usize,
    false_pos: usize,
    false_neg: usize,
    true_neg: usize,
}

impl Confusion {
    /// 单次遍历统计四项计数.
    fn tally(truth: &MrMask, prediction: &MrMask) -> Self {
        assert_eq!(truth.shape(), prediction.shape(), "真值与预测的形状必须一致");

        let mut ans = Self::default();
        for (t, p) in truth.data().iter().zip(prediction.data().iter()) {
            match (is_foreground(*t), is_foreground(*p)) {
                (true, true) => ans.true_pos += 1,
                (false, true) => ans.false_pos += 1,
                (true, false) => ans.false_neg += 1,
                (false, false) => ans.true_neg += 1,
            }
        }
        ans
    }

    /// 真值前景体素总数.
    #[inline]
    fn truth_total(&self) -> usize {
        self.true_pos + self.false_neg
    }

    /// 预测前景体素总数.
    #[inline]
    fn prediction_total(&self) -> usize {
        self.true_pos + self.false_pos
    }

    fn dice(&self) -> f64 {
        // 双空掩膜时为 0 / 0, 即 NaN. 保留该行为以显式标记无效样本.
        2.0 * self.true_pos as f64 / (self.truth_total() + self.prediction_total()) as f64
    }

    fn sensitivity(&self) -> f64 {
        if self.truth_total() == 0 {
            0.0
        } else {
            self.true_pos as f64 / self.truth_total() as f64
        }
    }

    fn specificity(&self) -> f64 {
        let denom = self.true_neg + self.false_pos;
        if denom == 0 {
            0.0
        } else {
            self.true_neg as f64 / denom as f64
        }
    }

    fn precision(&self) -> f64 {
        if self.prediction_total() == 0 {
            0.0
        } else {
            self.true_pos as f64 / self.prediction_total() as f64
        }
    }

    fn f1_score(&self) -> f64 {
        let (p, s) = (self.precision(), self.sensitivity());
        if p + s == 0.0 {
            0.0
        } else {
            2.0 * p * s / (p + s)
        }
    }

    fn volume_difference(&self) -> f64 {
        let truth = self.truth_total();
        if truth == 0 {
            0.0
        } else {
            truth.abs_diff(self.prediction_total()) as f64 / truth as f64
        }
    }
}

/// Dice 相似系数, `2 * |T ∩ P| / (|T| + |P|)`.
///
/// # 注意
///
/// 两个掩膜都为空时结果是 NaN 而不是约定值, 调用方据此识别无效样本.
pub fn dice(truth: &MrMask, prediction: &MrMask) -> f64 {
    Confusion::tally(truth, prediction).dice()
}

/// 灵敏度 (召回率), `|T ∩ P| / |T|`. 真值为空时取 0.
pub fn sensitivity(truth: &MrMask, prediction: &MrMask) -> f64 {
    Confusion::tally(truth, prediction).sensitivity()
}

/// 特异度, `|背景命中| / |真值背景|`. 真值不含背景时取 0.
pub fn specificity(truth: &MrMask, prediction: &MrMask) -> f64 {
    Confusion::tally(truth, prediction).specificity()
}

/// 精确率, `|T ∩ P| / |P|`. 预测为空时取 0.
pub fn precision(truth: &MrMask, prediction: &MrMask) -> f64 {
    Confusion::tally(truth, prediction).precision()
}

/// F1 分数, 精确率与灵敏度的调和平均. 两者皆零时取 0.
pub fn f1_score(truth: &MrMask, prediction: &MrMask) -> f64 {
    Confusion::tally(truth, prediction).f1_score()
}

/// 相对体积差, `||T| - |P|| / |T|`. 真值为空时取 0.
pub fn volume_difference(truth: &MrMask, prediction: &MrMask) -> f64 {
    Confusion::tally(truth, prediction).volume_difference()
}

/// 两点体素索引间欧氏距离的平方.
#[inline]
fn squared_distance(a: Idx3d, b: Idx3d) -> f64 {
    let dz = a.0.abs_diff(b.0) as f64;
    let dh = a.1.abs_diff(b.1) as f64;
    let dw = a.2.abs_diff(b.2) as f64;
    dz * dz + dh * dh + dw * dw
}

/// `from` 中每点到 `to` 的最近平方距离的最大值.
fn directed_squared(from: &[Idx3d], to: &[Idx3d]) -> f64 {
    from.iter()
        .map(|a| {
            to.iter()
                .map(|b| squared_distance(*a, *b))
                .fold(f64::INFINITY, f64::min)
        })
        .fold(0.0, f64::max)
}

/// 双向 Hausdorff 距离, 在体素索引坐标系下以欧氏距离度量.
///
/// 任一掩膜为空时取 0. 逐对枚举前景体素, 复杂度为
/// `O(|T| * |P|)`, 中间全程使用平方距离, 仅在最后开方一次.
pub fn hausdorff_distance(truth: &MrMask, prediction: &MrMask) -> f64 {
    assert_eq!(truth.shape(), prediction.shape(), "真值与预测的形状必须一致");

    let t = truth.filter_pos(is_foreground);
    let p = prediction.filter_pos(is_foreground);
    if t.is_empty() || p.is_empty() {
        return 0.0;
    }

    let forward = directed_squared(&t, &p);
    let backward = directed_squared(&p, &t);
    forward.max(backward).sqrt()
}

/// 统计预测中的假阳性病灶个数: 与真值前景零重叠的
/// 6-连通预测连通域.
pub fn lesion_false_positives(truth: &MrMask, prediction: &MrMask) -> usize {
    assert_eq!(truth.shape(), prediction.shape(), "真值与预测的形状必须一致");

    prediction
        .foreground_areas()
        .iter()
        .filter(|area| area.iter().all(|pos| is_background(truth[*pos])))
        .count()
}

/// 一对掩膜的全套评估结果.
#[derive(PartialEq, Default, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentationScores {
    /// Dice 相似系数.
    pub dice: f64,

    /// 灵敏度 (召回率).
    pub sensitivity: f64,

    /// 特异度.
    pub specificity: f64,

    /// 精确率.
    pub precision: f64,

    /// F1 分数.
    pub f1_score: f64,

    /// 相对体积差.
    pub volume_difference: f64,

    /// 双向 Hausdorff 距离, 以体素为单位.
    pub hausdorff_distance: f64,

    /// 假阳性病灶个数.
    pub false_positives: f64,
}

/// 评估单对掩膜, 体素级计数只遍历一次.
pub fn evaluate_segmentation(truth: &MrMask, prediction: &MrMask) -> SegmentationScores {
    let counts = Confusion::tally(truth, prediction);
    SegmentationScores {
        dice: counts.dice(),
        sensitivity: counts.sensitivity(),
        specificity: counts.specificity(),
        precision: counts.precision(),
        f1_score: counts.f1_score(),
        volume_difference: counts.volume_difference(),
        hausdorff_distance: hausdorff_distance(truth, prediction),
        false_positives: lesion_false_positives(truth, prediction) as f64,
    }
}

/// 逐对评估并对每个指标取算术平均.
///
/// `truths` 与 `predictions` 必须一一对应且非空, 否则 panic.
/// 单对样本产生的 NaN (如双空掩膜的 Dice) 会按 IEEE 规则传播到均值.
pub fn evaluate_batch(truths: &[MrMask], predictions: &[MrMask]) -> SegmentationScores {
    assert_eq!(truths.len(), predictions.len(), "真值与预测的个数必须一致");
    assert!(!truths.is_empty(), "批量评估至少需要一对掩膜");

    macro_rules! fold_means {
        ($($field:ident),+ $(,)?) => {{
            let mut total = SegmentationScores::default();
            for (truth, prediction) in truths.iter().zip(predictions) {
                let scores = evaluate_segmentation(truth, prediction);
                $(total.$field += scores.$field;)+
            }
            let n = truths.len() as f64;
            $(total.$field /= n;)+
            total
        }};
    }

    fold_means!(
        dice,
        sensitivity,
        specificity,
        precision,
        f1_score,
        volume_difference,
        hausdorff_distance,
        false_positives,
    )
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn mask_from(data: Array3<u8>) -> MrMask {
        MrMask::fake(data, [1.0, 1.0, 1.0])
    }

    /// 在 (2, 3, 3) 的空白掩膜上点亮给定体素.
    fn sparse_mask(lit: &[Idx3d]) -> MrMask {
        let mut data = Array3::zeros((2, 3, 3));
        for (z, h, w) in lit {
            data[[*z, *h, *w]] = 1;
        }
        mask_from(data)
    }

    #[test]
    fn perfect_match_scores_are_ideal() {
        let truth = sparse_mask(&[(0, 0, 0), (0, 0, 1), (1, 2, 2)]);
        let prediction = sparse_mask(&[(0, 0, 0), (0, 0, 1), (1, 2, 2)]);

        let scores = evaluate_segmentation(&truth, &prediction);
        assert!(f64_eq(scores.dice, 1.0));
        assert!(f64_eq(scores.sensitivity, 1.0));
        assert!(f64_eq(scores.specificity, 1.0));
        assert!(f64_eq(scores.precision, 1.0));
        assert!(f64_eq(scores.f1_score, 1.0));
        assert!(f64_eq(scores.volume_difference, 0.0));
        assert!(f64_eq(scores.hausdorff_distance, 0.0));
        assert!(f64_eq(scores.false_positives, 0.0));
    }

    #[test]
    fn disjoint_masks_have_zero_overlap_scores() {
        let truth = sparse_mask(&[(0, 0, 0)]);
        let prediction = sparse_mask(&[(1, 2, 2)]);

        assert!(f64_eq(dice(&truth, &prediction), 0.0));
        assert!(f64_eq(sensitivity(&truth, &prediction), 0.0));
        assert!(f64_eq(precision(&truth, &prediction), 0.0));
        assert!(f64_eq(f1_score(&truth, &prediction), 0.0));
        // 两者体积相同, 体积差依然为零.
        assert!(f64_eq(volume_difference(&truth, &prediction), 0.0));
        assert_eq!(lesion_false_positives(&truth, &prediction), 1);
    }

    #[test]
    fn dice_is_symmetric() {
        let a = sparse_mask(&[(0, 0, 0), (0, 1, 1), (1, 0, 2)]);
        let b = sparse_mask(&[(0, 1, 1), (1, 2, 0)]);
        assert!(f64_eq(dice(&a, &b), dice(&b, &a)));
    }

    #[test]
    fn empty_pair_dice_is_nan_and_guards_hold() {
        let truth = sparse_mask(&[]);
        let prediction = sparse_mask(&[]);

        let scores = evaluate_segmentation(&truth, &prediction);
        assert!(scores.dice.is_nan());
        assert!(f64_eq(scores.sensitivity, 0.0));
        assert!(f64_eq(scores.precision, 0.0));
        assert!(f64_eq(scores.f1_score, 0.0));
        assert!(f64_eq(scores.volume_difference, 0.0));
        assert!(f64_eq(scores.hausdorff_distance, 0.0));
        assert!(f64_eq(scores.false_positives, 0.0));
        // 全部体素都是真阴性.
        assert!(f64_eq(scores.specificity, 1.0));
    }

    #[test]
    fn all_foreground_pair_has_guarded_specificity() {
        let truth = mask_from(Array3::ones((2, 2, 2)));
        let prediction = mask_from(Array3::ones((2, 2, 2)));

        assert!(f64_eq(specificity(&truth, &prediction), 0.0));
        assert!(f64_eq(dice(&truth, &prediction), 1.0));
    }

    #[test]
    fn hand_checked_confusion_ratios() {
        // tp = 1, fp = 1, fn = 1, tn = 1.
        let truth = sparse_mask(&[(0, 0, 0), (0, 0, 1)]);
        let prediction = sparse_mask(&[(0, 0, 0), (0, 0, 2)]);

        let scores = evaluate_segmentation(&truth, &prediction);
        assert!(f64_eq(scores.dice, 0.5));
        assert!(f64_eq(scores.sensitivity, 0.5));
        assert!(f64_eq(scores.precision, 0.5));
        assert!(f64_eq(scores.f1_score, 0.5));
        assert!(f64_eq(scores.volume_difference, 0.0));
        assert!(f64_eq(scores.specificity, 15.0 / 16.0));
    }

    #[test]
    fn volume_difference_is_relative_to_truth() {
        let large = sparse_mask(&[(0, 0, 0), (0, 0, 1), (0, 1, 0), (0, 1, 1)]);
        let small = sparse_mask(&[(1, 0, 0), (1, 0, 1)]);

        assert!(f64_eq(volume_difference(&large, &small), 0.5));
        assert!(f64_eq(volume_difference(&small, &large), 1.0));
    }

    #[test]
    fn hausdorff_matches_known_geometry() {
        // 同一轴上相距 2 个体素.
        let a = sparse_mask(&[(0, 0, 0)]);
        let b = sparse_mask(&[(0, 0, 2)]);
        assert!(f64_eq(hausdorff_distance(&a, &b), 2.0));
        assert!(f64_eq(hausdorff_distance(&a, &a), 0.0));

        // 跨轴对角: (0, 2, 0) 到 (1, 2, 2) 距离 sqrt(5).
        let c = sparse_mask(&[(0, 2, 0)]);
        let d = sparse_mask(&[(1, 2, 2)]);
        assert!(f64_eq(hausdorff_distance(&c, &d), 5.0f64.sqrt()));

        // 有向距离不对称, 双向取最大值.
        let near_far = sparse_mask(&[(0, 0, 0), (0, 0, 2)]);
        let near = sparse_mask(&[(0, 0, 0)]);
        assert!(f64_eq(hausdorff_distance(&near_far, &near), 2.0));
        assert!(f64_eq(hausdorff_distance(&near, &near_far), 2.0));
    }

    #[test]
    fn hausdorff_of_empty_mask_is_zero() {
        let blank = sparse_mask(&[]);
        let lit = sparse_mask(&[(0, 1, 1)]);
        assert!(f64_eq(hausdorff_distance(&blank, &lit), 0.0));
        assert!(f64_eq(hausdorff_distance(&lit, &blank), 0.0));
        assert!(f64_eq(hausdorff_distance(&blank, &blank), 0.0));
    }

    #[test]
    fn false_positive_lesions_require_zero_overlap() {
        let truth = sparse_mask(&[(0, 0, 0), (0, 0, 1), (1, 0, 0)]);
        // 预测含三个连通域: 两个与真值至少共享一个体素, 一个完全脱离.
        let prediction = sparse_mask(&[(0, 0, 1), (0, 0, 2), (1, 0, 0), (1, 2, 2)]);

        assert_eq!(prediction.foreground_areas().len(), 3);
        assert_eq!(lesion_false_positives(&truth, &prediction), 1);

        // 部分重叠即可豁免: 连通域只要有一个体素落在真值内就不计假阳.
        let nudged = sparse_mask(&[(0, 0, 1), (0, 0, 2), (1, 2, 0), (1, 2, 2)]);
        assert_eq!(nudged.foreground_areas().len(), 3);
        assert_eq!(lesion_false_positives(&truth, &nudged), 2);
    }

    #[test]
    #[should_panic(expected = "形状")]
    fn shape_mismatch_is_rejected() {
        let truth = mask_from(Array3::zeros((1, 2, 2)));
        let prediction = mask_from(Array3::zeros((2, 2, 2)));
        let _ = dice(&truth, &prediction);
    }

    #[test]
    fn batch_averages_every_field() {
        let truths = vec![sparse_mask(&[(0, 0, 0)]), sparse_mask(&[(0, 0, 0)])];
        let predictions = vec![sparse_mask(&[(0, 0, 0)]), sparse_mask(&[(0, 0, 2)])];

        let means = evaluate_batch(&truths, &predictions);
        assert!(f64_eq(means.dice, 0.5));
        assert!(f64_eq(means.sensitivity, 0.5));
        assert!(f64_eq(means.precision, 0.5));
        assert!(f64_eq(means.f1_score, 0.5));
        assert!(f64_eq(means.hausdorff_distance, 1.0));
        assert!(f64_eq(means.false_positives, 0.5));
    }

    #[test]
    #[should_panic(expected = "个数必须一致")]
    fn batch_rejects_length_mismatch() {
        let truths = vec![sparse_mask(&[])];
        let _ = evaluate_batch(&truths, &[]);
    }

    #[test]
    #[should_panic(expected = "至少需要一对")]
    fn batch_rejects_empty_input() {
        let _ = evaluate_batch(&[], &[]);
    }

    #[test]
    fn external_parallel_evaluation_matches_sequential() {
        use rayon::prelude::*;

        let pairs: Vec<(MrMask, MrMask)> = (0..8)
            .map(|i| {
                (
                    sparse_mask(&[(0, 0, 0), (i % 2, 1, 1)]),
                    sparse_mask(&[(0, 0, 0), (1, i % 3, 2)]),
                )
            })
            .collect();

        let sequential: Vec<SegmentationScores> = pairs
            .iter()
            .map(|(t, p)| evaluate_segmentation(t, p))
            .collect();
        let parallel: Vec<SegmentationScores> = pairs
            .par_iter()
            .map(|(t, p)| evaluate_segmentation(t, p))
            .collect();
        assert_eq!(sequential, parallel);
    }
}
