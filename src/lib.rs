//! Blend Anim - Blender 骨骼动画求值管线
//!
//! 把交换格式中的原始关键帧曲线转换为可直接用于运行时骨架的逐帧变换：
//! - 贝塞尔曲线求值和通道类型识别
//! - 动作（Action）注册与按需生成轨道
//! - 骨骼层级与静止矩阵构建
//! - IK 计算用的代理骨骼链
//!
//! 文件解析不在本 crate 内，解析层只需交付 [`animation::source`] 中的类型化记录。

pub mod animation;
pub mod config;
pub mod skeleton;

pub use animation::{
    Action, ActionLoader, ActionRegistry, Animation, AnimationTarget, BezierControlPoint,
    BezierCurve, ChannelDescriptor, ChannelKind, CurveSet, LoadedFeatureIndex, SchemaVersion,
    Track, TrackBuilder, TrackSample, TrackTarget,
};
pub use config::{AnimationConfig, AnimationMatchMethod, ScaleFallback, UpAxis};
pub use skeleton::{BoneHierarchyBuilder, BoneNode, BoneTransform, PoseSolver, Skeleton};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimError {
    #[error("Invalid curve data: {0}")]
    InvalidCurveData(String),

    #[error("Unknown channel path: {0}")]
    UnknownChannelPath(String),

    #[error("Invalid chain topology: {0}")]
    InvalidChainTopology(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Constant curve set cannot produce a track: {0}")]
    ConstantCurveSet(String),

    #[error("Invalid hierarchy order: {0}")]
    InvalidHierarchyOrder(String),

    #[error("Frame {frame} out of range (slots: {len})")]
    FrameOutOfRange { frame: usize, len: usize },

    #[error("Pose solver already committed")]
    ProxyCommitted,
}

pub type Result<T> = std::result::Result<T, AnimError>;
