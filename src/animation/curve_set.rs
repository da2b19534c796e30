//! 曲线集合（Ipo）
//!
//! 一个特征（骨骼或场景对象）在一个动作中的全部插值曲线。

use std::collections::BTreeMap;

use super::{BezierCurve, ChannelKind};
use crate::{AnimError, Result};

/// 按通道类型索引的曲线（每种类型至多一条）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelCurves {
    curves: BTreeMap<ChannelKind, BezierCurve>,
}

impl ChannelCurves {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由曲线列表创建
    ///
    /// Unknown 类型的曲线被丢弃，同一类型出现多次时保留第一条。
    pub fn from_curves(curves: impl IntoIterator<Item = BezierCurve>) -> Self {
        let mut result = Self::new();
        for curve in curves {
            result.insert(curve);
        }
        result
    }

    /// 插入曲线，返回是否被接受
    pub fn insert(&mut self, curve: BezierCurve) -> bool {
        let kind = curve.kind();
        if kind == ChannelKind::Unknown {
            log::warn!("忽略未知类型的曲线 ({} 个控制点)", curve.points().len());
            return false;
        }
        if self.curves.contains_key(&kind) {
            log::warn!("重复的通道曲线 {:?}，保留第一条", kind);
            return false;
        }
        self.curves.insert(kind, curve);
        true
    }

    pub fn get(&self, kind: ChannelKind) -> Option<&BezierCurve> {
        self.curves.get(&kind)
    }

    pub fn contains(&self, kind: ChannelKind) -> bool {
        self.curves.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BezierCurve> {
        self.curves.values()
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// 所有曲线中最后一个锚点的最大帧（最小为 1）
    pub fn last_frame(&self) -> i32 {
        self.curves
            .values()
            .map(BezierCurve::last_frame)
            .fold(1, i32::max)
    }

    fn has_any(&self, pred: fn(ChannelKind) -> bool) -> bool {
        self.curves.keys().any(|&k| pred(k))
    }

    pub fn has_quaternion(&self) -> bool {
        self.has_any(ChannelKind::is_quaternion)
    }

    pub fn has_euler_rotation(&self) -> bool {
        self.has_any(ChannelKind::is_euler_rotation)
    }

    pub fn has_scale(&self) -> bool {
        self.has_any(ChannelKind::is_scale)
    }
}

/// 曲线集合
#[derive(Clone, Debug, PartialEq)]
pub enum CurveSet {
    /// 类型化的曲线，可以生成轨道
    Channels(ChannelCurves),
    /// 只有一个常量值，不能生成轨道
    Constant(f64),
}

impl CurveSet {
    pub fn from_curves(curves: impl IntoIterator<Item = BezierCurve>) -> Self {
        CurveSet::Channels(ChannelCurves::from_curves(curves))
    }

    pub fn constant(value: f64) -> Self {
        CurveSet::Constant(value)
    }

    /// 最后一帧（最小为 1）
    pub fn last_frame(&self) -> i32 {
        match self {
            CurveSet::Channels(curves) => curves.last_frame(),
            CurveSet::Constant(_) => 1,
        }
    }

    /// 在指定帧求值
    ///
    /// 常量集合返回常量；类型化集合返回第一条曲线的值，没有曲线时返回 None。
    pub fn value_at(&self, frame: i32) -> Option<f64> {
        match self {
            CurveSet::Constant(value) => Some(*value),
            CurveSet::Channels(curves) => curves.iter().next().map(|c| c.value_at(frame)),
        }
    }

    /// 指定通道在指定帧的值
    pub fn channel_value(&self, kind: ChannelKind, frame: i32) -> Option<f64> {
        match self {
            CurveSet::Constant(value) => Some(*value),
            CurveSet::Channels(curves) => curves.get(kind).map(|c| c.value_at(frame)),
        }
    }

    /// 取出可生成轨道的曲线
    pub fn channels(&self, feature: &str) -> Result<&ChannelCurves> {
        match self {
            CurveSet::Channels(curves) => Ok(curves),
            CurveSet::Constant(_) => Err(AnimError::ConstantCurveSet(feature.to_string())),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, CurveSet::Constant(_))
    }
}
