//! 轨道构建
//!
//! 对动作中的每个特征逐帧（1..=stop_frame）求值所有曲线，按通道类型
//! 路由到平移/旋转/缩放分量，与目标的基准变换合成样本，最后均衡帧数。

use std::collections::HashMap;

use glam::{EulerRot, Quat, Vec3};

use super::{
    equalize_tracks, Action, Animation, ChannelCurves, ChannelKind, Track, TrackSample, TrackTarget,
};
use crate::config::{AnimationConfig, ScaleFallback};
use crate::skeleton::{BoneTransform, Skeleton};
use crate::{AnimError, Result};

/// 动画的绑定目标
#[derive(Clone, Copy, Debug)]
pub enum AnimationTarget<'a> {
    /// 骨架：特征名与骨骼名对应，基准变换为单位变换
    Skeleton(&'a Skeleton),
    /// 场景节点：特征名与节点名对应，基准变换为节点的局部变换
    Node { name: &'a str, local: BoneTransform },
}

/// 缓存用的目标标识
///
/// 骨架按名称和有序骨骼名区分，节点按名称和基准变换的位模式区分。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetKey {
    Skeleton { name: String, bones: Vec<String> },
    Node { name: String, base: [u32; 10] },
}

impl AnimationTarget<'_> {
    pub fn key(&self) -> TargetKey {
        match self {
            AnimationTarget::Skeleton(skeleton) => TargetKey::Skeleton {
                name: skeleton.name().to_string(),
                bones: skeleton.bone_names().map(str::to_string).collect(),
            },
            AnimationTarget::Node { name, local } => TargetKey::Node {
                name: (*name).to_string(),
                base: transform_bits(local),
            },
        }
    }

    /// (特征名, 轨道目标, 基准变换)
    fn bindings(&self) -> Vec<(String, TrackTarget, BoneTransform)> {
        match self {
            AnimationTarget::Skeleton(skeleton) => skeleton
                .bone_names()
                .enumerate()
                .map(|(index, name)| {
                    (name.to_string(), TrackTarget::Bone { index }, BoneTransform::IDENTITY)
                })
                .collect(),
            AnimationTarget::Node { name, local } => vec![(
                (*name).to_string(),
                TrackTarget::Object {
                    name: (*name).to_string(),
                },
                *local,
            )],
        }
    }
}

fn transform_bits(transform: &BoneTransform) -> [u32; 10] {
    let t = transform.translation;
    let r = transform.rotation;
    let s = transform.scale;
    [t.x, t.y, t.z, r.x, r.y, r.z, r.w, s.x, s.y, s.z].map(f32::to_bits)
}

#[derive(Clone, Copy)]
enum Component {
    Location(usize),
    Euler(usize),
    Scale(usize),
    QuatW,
    Quat(usize),
}

fn component(kind: ChannelKind) -> Option<Component> {
    use ChannelKind::*;
    Some(match kind {
        LocationX => Component::Location(0),
        LocationY => Component::Location(1),
        LocationZ => Component::Location(2),
        RotationX => Component::Euler(0),
        RotationY => Component::Euler(1),
        RotationZ => Component::Euler(2),
        ScaleX => Component::Scale(0),
        ScaleY => Component::Scale(1),
        ScaleZ => Component::Scale(2),
        QuaternionW => Component::QuatW,
        QuaternionX => Component::Quat(0),
        QuaternionY => Component::Quat(1),
        QuaternionZ => Component::Quat(2),
        Unknown => return None,
    })
}

/// Z 轴向上换成 Y 轴向上：Y -> Z（signed 时取反），Z -> Y
fn remap(axis: usize, fix_up_axis: bool, signed: bool) -> (usize, f32) {
    match (axis, fix_up_axis) {
        (1, true) => (2, if signed { -1.0 } else { 1.0 }),
        (2, true) => (1, 1.0),
        (axis, _) => (axis, 1.0),
    }
}

/// 轨道构建器
pub struct TrackBuilder<'a> {
    config: &'a AnimationConfig,
}

impl<'a> TrackBuilder<'a> {
    pub fn new(config: &'a AnimationConfig) -> Self {
        Self { config }
    }

    /// 为目标上的每个特征构建轨道并均衡帧数
    ///
    /// 动作中缺失的特征和常量曲线集合被跳过。
    pub fn build_tracks(
        &self,
        action: &Action,
        target: &AnimationTarget<'_>,
    ) -> HashMap<String, Track> {
        let mut tracks = HashMap::new();
        for (feature, track_target, base) in target.bindings() {
            match self.build_track(action, &feature, track_target, &base) {
                Ok(track) => {
                    tracks.insert(feature, track);
                }
                Err(AnimError::FeatureNotFound(_)) => {}
                Err(e) => log::warn!("动作 {} 跳过特征 {}: {}", action.name(), feature, e),
            }
        }
        equalize_tracks(tracks.values_mut());
        tracks
    }

    /// 构建可播放的动画，轨道按特征名排序
    pub fn build_animation(&self, action: &Action, target: &AnimationTarget<'_>) -> Animation {
        let mut named: Vec<(String, Track)> =
            self.build_tracks(action, target).into_iter().collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        let tracks: Vec<Track> = named.into_iter().map(|(_, track)| track).collect();
        log::info!("动作 {}: {} 条轨道", action.name(), tracks.len());
        Animation::new(action.name(), action.animation_time(), tracks)
    }

    /// 构建单个特征的轨道
    pub fn build_track(
        &self,
        action: &Action,
        feature: &str,
        target: TrackTarget,
        base: &BoneTransform,
    ) -> Result<Track> {
        let curves = action.feature(feature)?.channels(feature)?;
        let is_bone = matches!(target, TrackTarget::Bone { .. });

        if self.config.scale_fallback == ScaleFallback::SourceCompatible
            && [ChannelKind::ScaleX, ChannelKind::ScaleY, ChannelKind::ScaleZ]
                .iter()
                .any(|&k| !curves.contains(k))
        {
            log::warn!("{}: 缺少缩放通道，使用 0 缩放", feature);
        }

        let samples: Vec<TrackSample> = (1..=action.stop_frame())
            .map(|frame| self.sample(curves, frame, is_bone, base))
            .collect();
        Ok(Track::from_samples(target, action.fps(), &samples))
    }

    fn sample(
        &self,
        curves: &ChannelCurves,
        frame: i32,
        is_bone: bool,
        base: &BoneTransform,
    ) -> TrackSample {
        let fix = self.config.fix_up_axis;
        let fallback = match self.config.scale_fallback {
            ScaleFallback::Identity => 1.0,
            ScaleFallback::SourceCompatible => 0.0,
        };

        let mut location = [0.0f32; 3];
        let mut euler = [0.0f32; 3];
        let mut scale = [fallback; 3];
        let mut quat_w = 1.0f32;
        let mut quat_xyz = [0.0f32; 3];

        for curve in curves.iter() {
            let Some(component) = component(curve.kind()) else {
                continue;
            };
            let value = curve.value_at(frame) as f32;
            match component {
                Component::Location(axis) => {
                    let (axis, sign) = remap(axis, fix, true);
                    location[axis] = sign * value;
                }
                Component::Euler(axis) => {
                    let (axis, sign) = remap(axis, fix, true);
                    euler[axis] = sign * value;
                }
                Component::Scale(axis) => {
                    let (axis, _) = remap(axis, fix, false);
                    scale[axis] = value;
                }
                Component::QuatW => quat_w = value,
                Component::Quat(axis) => {
                    let (axis, sign) = remap(axis, fix, true);
                    quat_xyz[axis] = sign * value;
                }
            }
        }

        let from_quat = || {
            let q = Quat::from_xyzw(quat_xyz[0], quat_xyz[1], quat_xyz[2], quat_w);
            if q.length_squared() > 0.0 {
                q.normalize()
            } else {
                Quat::IDENTITY
            }
        };
        let from_euler = || Quat::from_euler(EulerRot::XYZ, euler[0], euler[1], euler[2]);

        // 骨骼优先使用四元数，场景对象优先使用欧拉角
        let rotation = match (is_bone, curves.has_quaternion(), curves.has_euler_rotation()) {
            (true, true, _) | (false, true, false) => from_quat(),
            (_, _, true) => from_euler(),
            _ => Quat::IDENTITY,
        };

        let location = Vec3::from_array(location);
        TrackSample {
            translation: base.rotation * location + base.translation,
            rotation: if is_bone {
                base.rotation * rotation
            } else {
                rotation * base.rotation
            },
            scale: base.scale * Vec3::from_array(scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{BezierControlPoint, BezierCurve, CurveSet};
    use crate::skeleton::BoneNode;

    fn curve(kind: ChannelKind, keys: &[(f32, f32)]) -> BezierCurve {
        let points = keys
            .iter()
            .map(|&(f, v)| BezierControlPoint::key(f, v))
            .collect();
        BezierCurve::new(kind, points).unwrap()
    }

    fn skeleton(names: &[&str]) -> Skeleton {
        let mut skeleton = Skeleton::new("Armature");
        for name in names {
            skeleton.add_bone(BoneNode::new(*name)).unwrap();
        }
        skeleton.update_model_transforms();
        skeleton
    }

    fn raw_config() -> AnimationConfig {
        AnimationConfig::default().with_fix_up_axis(false)
    }

    #[test]
    fn test_location_round_trip() {
        let mut action = Action::new("slide", 25);
        action.insert_feature(
            "Arm",
            CurveSet::from_curves([
                curve(ChannelKind::LocationX, &[(1.0, 0.5), (10.0, 2.0)]),
                curve(ChannelKind::LocationY, &[(1.0, -1.0), (10.0, 3.0)]),
                curve(ChannelKind::LocationZ, &[(1.0, 0.0), (10.0, -4.5)]),
            ]),
        );
        let skeleton = skeleton(&["Root", "Arm"]);
        let config = raw_config();
        let target = AnimationTarget::Skeleton(&skeleton);
        let tracks = TrackBuilder::new(&config).build_tracks(&action, &target);

        let track = &tracks["Arm"];
        assert_eq!(track.target_bone_index(), Some(1));
        assert_eq!(track.frame_count(), 10);
        let first = track.sample(0).unwrap().translation;
        let last = track.sample(9).unwrap().translation;
        assert!(first.abs_diff_eq(Vec3::new(0.5, -1.0, 0.0), 1e-4));
        assert!(last.abs_diff_eq(Vec3::new(2.0, 3.0, -4.5), 1e-4));
        assert!((track.duration() - 9.0 / 25.0).abs() < 1e-6);
        assert!(!tracks.contains_key("Root"));
    }

    #[test]
    fn test_axis_fix_remaps_channels() {
        let mut action = Action::new("fix", 25);
        action.insert_feature(
            "Arm",
            CurveSet::from_curves([
                curve(ChannelKind::LocationY, &[(1.0, 2.0)]),
                curve(ChannelKind::LocationZ, &[(1.0, 3.0)]),
                curve(ChannelKind::ScaleY, &[(1.0, 4.0)]),
            ]),
        );
        let skeleton = skeleton(&["Arm"]);
        let config = AnimationConfig::default();
        let target = AnimationTarget::Skeleton(&skeleton);
        let tracks = TrackBuilder::new(&config).build_tracks(&action, &target);
        let sample = tracks["Arm"].sample(0).unwrap();
        assert_eq!(sample.translation, Vec3::new(0.0, 3.0, -2.0));
        assert_eq!(sample.scale, Vec3::new(1.0, 1.0, 4.0));
    }

    #[test]
    fn test_scale_fallback() {
        let mut action = Action::new("still", 25);
        let location = curve(ChannelKind::LocationX, &[(1.0, 1.0)]);
        action.insert_feature("Arm", CurveSet::from_curves([location]));
        let skeleton = skeleton(&["Arm"]);
        let target = AnimationTarget::Skeleton(&skeleton);

        let identity = raw_config();
        let tracks = TrackBuilder::new(&identity).build_tracks(&action, &target);
        assert_eq!(tracks["Arm"].scales()[0], Vec3::ONE);

        let legacy = raw_config().with_scale_fallback(ScaleFallback::SourceCompatible);
        let tracks = TrackBuilder::new(&legacy).build_tracks(&action, &target);
        assert_eq!(tracks["Arm"].scales()[0], Vec3::ZERO);
    }

    #[test]
    fn test_bone_quaternion_rotation() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let mut action = Action::new("turn", 25);
        action.insert_feature(
            "Arm",
            CurveSet::from_curves([
                curve(ChannelKind::QuaternionW, &[(1.0, half)]),
                curve(ChannelKind::QuaternionZ, &[(1.0, half)]),
                curve(ChannelKind::RotationX, &[(1.0, 1.0)]),
            ]),
        );
        let skeleton = skeleton(&["Arm"]);
        let config = raw_config();
        let target = AnimationTarget::Skeleton(&skeleton);
        let tracks = TrackBuilder::new(&config).build_tracks(&action, &target);
        let rotation = tracks["Arm"].rotations()[0];
        assert!(rotation.abs_diff_eq(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), 1e-5));
    }

    #[test]
    fn test_object_track_composes_with_node_transform() {
        let mut action = Action::new("spin", 25);
        action.insert_feature(
            "Cube",
            CurveSet::from_curves([
                curve(ChannelKind::RotationZ, &[(1.0, 0.0), (5.0, std::f32::consts::FRAC_PI_2)]),
                curve(ChannelKind::LocationX, &[(1.0, 1.0)]),
            ]),
        );
        let local = BoneTransform::new(
            Vec3::new(0.0, 0.0, 5.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let target = AnimationTarget::Node { name: "Cube", local };
        let config = raw_config();
        let animation = TrackBuilder::new(&config).build_animation(&action, &target);

        assert_eq!(animation.tracks.len(), 1);
        let track = &animation.tracks[0];
        assert_eq!(track.target(), &TrackTarget::Object { name: "Cube".into() });
        let first = track.sample(0).unwrap();
        // 平移先经基准旋转：X 轴变成 Y 轴
        assert!(first.translation.abs_diff_eq(Vec3::new(0.0, 1.0, 5.0), 1e-5));
        assert_eq!(first.scale, Vec3::splat(2.0));
        let last = track.sample(4).unwrap();
        assert!(last
            .rotation
            .abs_diff_eq(Quat::from_rotation_z(std::f32::consts::PI), 1e-5));
        assert!((animation.duration - 4.0 / 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_constant_and_missing_features_are_skipped() {
        let mut action = Action::new("mixed", 25);
        action.insert_feature("Arm", CurveSet::constant(0.25));
        let location = curve(ChannelKind::LocationX, &[(1.0, 0.0), (8.0, 1.0)]);
        action.insert_feature("Leg", CurveSet::from_curves([location]));
        let skeleton = skeleton(&["Arm", "Leg", "Head"]);
        let config = raw_config();
        let target = AnimationTarget::Skeleton(&skeleton);
        let tracks = TrackBuilder::new(&config).build_tracks(&action, &target);

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks["Leg"].frame_count(), 8);

        let node = AnimationTarget::Node {
            name: "Lamp",
            local: BoneTransform::IDENTITY,
        };
        assert!(TrackBuilder::new(&config).build_animation(&action, &node).is_empty());
    }

    #[test]
    fn test_target_keys() {
        let reordered = skeleton(&["Spine", "Arm"]);
        let skeleton = skeleton(&["Arm"]);
        assert_eq!(
            AnimationTarget::Skeleton(&skeleton).key(),
            TargetKey::Skeleton {
                name: "Armature".into(),
                bones: vec!["Arm".into()],
            }
        );
        assert_ne!(
            AnimationTarget::Skeleton(&skeleton).key(),
            AnimationTarget::Skeleton(&reordered).key()
        );

        let node = AnimationTarget::Node {
            name: "Lamp",
            local: BoneTransform::IDENTITY,
        };
        let TargetKey::Node { name, .. } = node.key() else {
            panic!("node target produced a skeleton key");
        };
        assert_eq!(name, "Lamp");
        let mut moved = BoneTransform::IDENTITY;
        moved.translation.y = 7.0;
        let moved = AnimationTarget::Node {
            name: "Lamp",
            local: moved,
        };
        assert_ne!(node.key(), moved.key());
    }
}
