//! 动画轨道
//!
//! 轨道是曲线集合在某个骨骼或场景对象上的逐帧采样结果，
//! 每帧一个 (时间, 平移, 旋转, 缩放) 样本。

use glam::{Quat, Vec3};

use crate::skeleton::BoneTransform;
use crate::{AnimError, Result};

/// 轨道绑定的目标
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrackTarget {
    /// 场景对象轨道（按节点名绑定）
    Object { name: String },
    /// 骨骼轨道（按骨骼索引绑定到骨架）
    Bone { index: usize },
}

/// 单帧样本
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackSample {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for TrackSample {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl From<BoneTransform> for TrackSample {
    fn from(t: BoneTransform) -> Self {
        Self {
            translation: t.translation,
            rotation: t.rotation,
            scale: t.scale,
        }
    }
}

impl TrackSample {
    pub fn lerp(&self, other: &TrackSample, amount: f32) -> TrackSample {
        TrackSample {
            translation: self.translation.lerp(other.translation, amount),
            rotation: self.rotation.slerp(other.rotation, amount),
            scale: self.scale.lerp(other.scale, amount),
        }
    }
}

/// 动画轨道
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    target: TrackTarget,
    times: Vec<f32>,
    translations: Vec<Vec3>,
    rotations: Vec<Quat>,
    scales: Vec<Vec3>,
}

impl Track {
    /// 由样本创建，第 i 个样本的时间为 i / fps
    pub fn from_samples(target: TrackTarget, fps: u32, samples: &[TrackSample]) -> Self {
        let step = 1.0 / fps.max(1) as f32;
        Self {
            target,
            times: (0..samples.len()).map(|i| i as f32 * step).collect(),
            translations: samples.iter().map(|s| s.translation).collect(),
            rotations: samples.iter().map(|s| s.rotation).collect(),
            scales: samples.iter().map(|s| s.scale).collect(),
        }
    }

    pub fn target(&self) -> &TrackTarget {
        &self.target
    }

    /// 骨骼轨道的目标骨骼索引
    pub fn target_bone_index(&self) -> Option<usize> {
        match self.target {
            TrackTarget::Bone { index } => Some(index),
            TrackTarget::Object { .. } => None,
        }
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn translations(&self) -> &[Vec3] {
        &self.translations
    }

    pub fn rotations(&self) -> &[Quat] {
        &self.rotations
    }

    pub fn scales(&self) -> &[Vec3] {
        &self.scales
    }

    pub fn frame_count(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// 轨道时长（最后一个样本的时间）
    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// 第 index 帧的样本
    pub fn sample(&self, index: usize) -> Option<TrackSample> {
        Some(TrackSample {
            translation: *self.translations.get(index)?,
            rotation: *self.rotations.get(index)?,
            scale: *self.scales.get(index)?,
        })
    }

    /// 覆盖全部关键帧
    ///
    /// 所有数组长度必须一致。
    pub fn set_keyframes(
        &mut self,
        times: Vec<f32>,
        translations: Vec<Vec3>,
        rotations: Vec<Quat>,
        scales: Vec<Vec3>,
    ) -> Result<()> {
        let len = times.len();
        for other in [translations.len(), rotations.len(), scales.len()] {
            if other != len {
                return Err(AnimError::FrameOutOfRange { frame: other, len });
            }
        }
        self.times = times;
        self.translations = translations;
        self.rotations = rotations;
        self.scales = scales;
        Ok(())
    }

    /// 用最后一个样本把轨道补齐到 frame_count 帧，并使用给定的公共时间轴
    fn pad_to(&mut self, shared_times: &[f32]) {
        let frame_count = shared_times.len();
        if let Some(last) = self.sample(self.frame_count().saturating_sub(1)) {
            self.translations.resize(frame_count, last.translation);
            self.rotations.resize(frame_count, last.rotation);
            self.scales.resize(frame_count, last.scale);
        }
        self.times = shared_times.to_vec();
    }

    /// 按时间采样（平移和缩放线性插值，旋转球面插值），超出范围时钳制到端点
    ///
    /// NaN 时间返回第一帧。
    pub fn sample_at(&self, time: f32) -> Option<TrackSample> {
        let first = *self.times.first()?;
        let last = *self.times.last()?;
        if time.is_nan() || time <= first {
            return self.sample(0);
        }
        if time >= last {
            return self.sample(self.frame_count() - 1);
        }

        // times 严格递增，next >= 1
        let next = self.times.partition_point(|&t| t <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let amount = if span > 0.0 {
            (time - self.times[prev]) / span
        } else {
            0.0
        };
        Some(self.sample(prev)?.lerp(&self.sample(next)?, amount))
    }
}

/// 帧数均衡
///
/// 帧数最多的轨道决定公共帧数和时间轴，较短的轨道重复最后一个样本补齐。
pub fn equalize_tracks<'a>(tracks: impl IntoIterator<Item = &'a mut Track>) {
    let mut tracks: Vec<&mut Track> = tracks.into_iter().collect();
    let shared_times = match tracks.iter().max_by_key(|t| t.frame_count()) {
        Some(longest) => longest.times.clone(),
        None => return,
    };

    for track in tracks.iter_mut() {
        if track.times != shared_times {
            log::debug!(
                "均衡轨道 {:?}: {} -> {} 帧",
                track.target,
                track.frame_count(),
                shared_times.len()
            );
            track.pad_to(&shared_times);
        }
    }
}

/// 可播放的动画（轨道 + 时长）
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    pub name: String,
    /// 时长（秒）
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl Animation {
    pub fn new(name: impl Into<String>, duration: f32, tracks: Vec<Track>) -> Self {
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }

    /// 查找目标骨骼的轨道
    pub fn bone_track(&self, bone_index: usize) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| t.target_bone_index() == Some(bone_index))
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
