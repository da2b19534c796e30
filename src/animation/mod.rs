//! 动画系统
//!
//! 提供贝塞尔曲线求值、通道识别、动作加载、轨道构建和动作注册表。

mod action;
mod bezier;
mod builder;
mod channel;
mod curve_set;
mod registry;
pub mod source;
mod track;

pub use action::Action;
pub use bezier::{BezierControlPoint, BezierCurve, CurveAxis};
pub use builder::{AnimationTarget, TargetKey, TrackBuilder};
pub use channel::{adrcode, ChannelDescriptor, ChannelKind};
pub use curve_set::{ChannelCurves, CurveSet};
pub use registry::ActionRegistry;
pub use source::{ActionLoader, LoadedFeatureIndex, SchemaVersion};
pub use track::{equalize_tracks, Animation, Track, TrackSample, TrackTarget};
