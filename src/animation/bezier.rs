//! 贝塞尔曲线插值
//!
//! 每个控制点由入手柄、锚点、出手柄三个点组成。锚点的 X 分量是帧位置，
//! Y 分量是通道值。相邻两个控制点之间按三次 Bernstein 基函数混合。

use glam::{DVec3, Vec3};

use super::ChannelKind;
use crate::{AnimError, Result};

/// 要取出的控制点分量（动画使用 Y，即数值轴）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveAxis {
    X,
    Y,
    Z,
}

impl CurveAxis {
    fn pick(self, v: DVec3) -> f64 {
        match self {
            CurveAxis::X => v.x,
            CurveAxis::Y => v.y,
            CurveAxis::Z => v.z,
        }
    }
}

/// 贝塞尔控制点（解析后不可变）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BezierControlPoint {
    pub in_handle: Vec3,
    pub anchor: Vec3,
    pub out_handle: Vec3,
    pub radius: f32,
}

impl BezierControlPoint {
    pub fn new(in_handle: Vec3, anchor: Vec3, out_handle: Vec3) -> Self {
        Self {
            in_handle,
            anchor,
            out_handle,
            radius: 1.0,
        }
    }

    /// 从原始三元组创建（顺序：入手柄、锚点、出手柄）
    pub fn from_triple(triple: &[[f32; 3]; 3], radius: f32) -> Self {
        Self {
            in_handle: Vec3::from_array(triple[0]),
            anchor: Vec3::from_array(triple[1]),
            out_handle: Vec3::from_array(triple[2]),
            radius,
        }
    }

    /// 二维关键帧点：手柄与锚点重合，(frame, value)
    pub fn key(frame: f32, value: f32) -> Self {
        let p = Vec3::new(frame, value, 0.0);
        Self::new(p, p, p)
    }

    /// 锚点所在帧
    pub fn frame(&self) -> f32 {
        self.anchor.x
    }
}

/// 单通道贝塞尔曲线
#[derive(Clone, Debug, PartialEq)]
pub struct BezierCurve {
    kind: ChannelKind,
    points: Vec<BezierControlPoint>,
}

impl BezierCurve {
    /// 创建曲线
    ///
    /// 控制点不能为空，锚点帧位置必须单调不减。
    pub fn new(kind: ChannelKind, points: Vec<BezierControlPoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(AnimError::InvalidCurveData(format!(
                "{:?} curve has no control points",
                kind
            )));
        }
        if let Some(i) = points
            .windows(2)
            .position(|pair| pair[1].frame() < pair[0].frame())
        {
            return Err(AnimError::InvalidCurveData(format!(
                "{:?} curve anchors are not ordered at point {}",
                kind,
                i + 1
            )));
        }
        Ok(Self { kind, points })
    }

    /// 从原始三元组数组创建
    pub fn from_triples(kind: ChannelKind, triples: &[[[f32; 3]; 3]]) -> Result<Self> {
        let points = triples
            .iter()
            .map(|t| BezierControlPoint::from_triple(t, 1.0))
            .collect();
        Self::new(kind, points)
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn points(&self) -> &[BezierControlPoint] {
        &self.points
    }

    /// 最后一个锚点所在帧（向上取整）
    pub fn last_frame(&self) -> i32 {
        // new() 保证至少有一个点
        self.points
            .last()
            .map(|p| p.frame().ceil() as i32)
            .unwrap_or(0)
    }

    /// 通道值（Y 分量）
    pub fn value_at(&self, frame: i32) -> f64 {
        self.evaluate(frame, CurveAxis::Y)
    }

    /// 评估贝塞尔曲线
    ///
    /// 帧位置在第一个锚点之前返回第一个锚点的值，在最后一个锚点之后返回最后一个锚点的值。
    /// 所有中间计算使用 f64。
    pub fn evaluate(&self, frame: i32, axis: CurveAxis) -> f64 {
        let frame = frame as f64;

        for pair in self.points.windows(2) {
            let (p0, p1) = (&pair[0], &pair[1]);
            let start = p0.anchor.x as f64;
            let end = p1.anchor.x as f64;
            if frame < start || frame > end {
                continue;
            }

            let span = end - start;
            if span <= 0.0 {
                // 同一帧上的两个锚点，取后一个
                return axis.pick(p1.anchor.as_dvec3());
            }

            let t = (frame - start) / span;
            return axis.pick(cubic_bernstein(
                p0.anchor.as_dvec3(),
                p0.out_handle.as_dvec3(),
                p1.in_handle.as_dvec3(),
                p1.anchor.as_dvec3(),
                t,
            ));
        }

        // 单点曲线或者超出范围：钳制到端点
        let first = &self.points[0];
        if self.points.len() == 1 || frame < first.anchor.x as f64 {
            axis.pick(first.anchor.as_dvec3())
        } else {
            axis.pick(self.points[self.points.len() - 1].anchor.as_dvec3())
        }
    }
}

fn cubic_bernstein(p0: DVec3, p1: DVec3, p2: DVec3, p3: DVec3, t: f64) -> DVec3 {
    let s = 1.0 - t;
    let s2 = s * s;
    let t2 = t * t;

    p0 * (s2 * s) + p1 * (3.0 * t * s2) + p2 * (3.0 * t2 * s) + p3 * (t2 * t)
}
