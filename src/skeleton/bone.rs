//! 骨骼节点

use glam::{Mat4, Quat, Vec3};

use super::BoneTransform;
use crate::animation::source::{Address, PoseChannelRecord};

/// 骨骼标志
pub mod flags {
    /// 骨骼头部与父骨骼尾部相连
    pub const CONNECTED_TO_PARENT: i32 = 0x0010;
}

/// 姿态通道 IK 标志
pub mod ik_flags {
    pub const LOCK_X: i32 = 0x01;
    pub const LOCK_Y: i32 = 0x02;
    pub const LOCK_Z: i32 = 0x04;
    pub const LIMIT_X: i32 = 0x08;
    pub const LIMIT_Y: i32 = 0x10;
    pub const LIMIT_Z: i32 = 0x20;
}

/// 手工摆放的姿态偏移及 IK 参数
#[derive(Clone, Debug, PartialEq)]
pub struct PoseChannel {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub ik_stretch: f32,
    pub limit_min: Vec3,
    pub limit_max: Vec3,
    pub stiffness: Vec3,
    pub ik_flag: i32,
}

impl Default for PoseChannel {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            ik_stretch: 0.0,
            limit_min: Vec3::ZERO,
            limit_max: Vec3::ZERO,
            stiffness: Vec3::ZERO,
            ik_flag: 0,
        }
    }
}

impl PoseChannel {
    /// 从记录创建，fix_up_axis 时把 Z 轴向上换成 Y 轴向上
    pub fn from_record(record: &PoseChannelRecord, fix_up_axis: bool) -> Self {
        let [l0, l1, l2] = record.loc;
        let [qw, qx, qy, qz] = record.quat;
        let [s0, s1, s2] = record.size;
        let (translation, rotation, scale) = if fix_up_axis {
            (
                Vec3::new(l0, -l2, l1),
                Quat::from_xyzw(qx, -qz, qy, qw),
                Vec3::new(s0, s2, s1),
            )
        } else {
            (
                Vec3::new(l0, l1, l2),
                Quat::from_xyzw(qx, qy, qz, qw),
                Vec3::new(s0, s1, s2),
            )
        };
        let rotation = if rotation.length_squared() > 0.0 {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };

        Self {
            translation,
            rotation,
            scale,
            ik_stretch: record.ik_stretch,
            limit_min: Vec3::from_array(record.limit_min),
            limit_max: Vec3::from_array(record.limit_max),
            stiffness: Vec3::from_array(record.stiffness),
            ik_flag: record.ik_flag,
        }
    }

    /// 轴向是否被 IK 锁定（axis: 0 = X, 1 = Y, 2 = Z）
    pub fn is_locked(&self, axis: usize) -> bool {
        const LOCKS: [i32; 3] = [ik_flags::LOCK_X, ik_flags::LOCK_Y, ik_flags::LOCK_Z];
        LOCKS.get(axis).map_or(false, |&f| self.ik_flag & f != 0)
    }

    /// 轴向角度限制是否生效（锁定的轴不再受限制）
    pub fn has_limit(&self, axis: usize) -> bool {
        const LIMITS: [i32; 3] = [ik_flags::LIMIT_X, ik_flags::LIMIT_Y, ik_flags::LIMIT_Z];
        !self.is_locked(axis) && LIMITS.get(axis).map_or(false, |&f| self.ik_flag & f != 0)
    }

    /// 叠加到绑定变换上：平移相加、旋转相乘、缩放相乘
    pub fn apply_to(&self, bind: &BoneTransform) -> BoneTransform {
        BoneTransform {
            translation: bind.translation + self.translation,
            rotation: (bind.rotation * self.rotation).normalize(),
            scale: bind.scale * self.scale,
        }
    }
}

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct BoneNode {
    pub name: String,
    /// 源文件中的地址（用于查找姿态通道）
    pub address: Address,
    pub parent_index: Option<usize>,
    pub children: Vec<usize>,
    pub length: f32,
    pub flag: i32,

    // 构建过程中的矩阵
    pub armature_matrix: Mat4,
    /// 由父骨骼先于子骨骼计算
    pub inverse_total: Option<Mat4>,
    pub rest_matrix: Mat4,

    /// 绑定变换（由静止矩阵分解）
    pub bind: BoneTransform,
    pub pose_channel: Option<PoseChannel>,
    /// 绑定变换叠加姿态通道后的结果
    pub pose_transform: Option<BoneTransform>,

    // 运行时状态
    pub local: BoneTransform,
    pub model: BoneTransform,
    pub user_control: bool,
}

impl BoneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: 0,
            parent_index: None,
            children: Vec::new(),
            length: 1.0,
            flag: 0,
            armature_matrix: Mat4::IDENTITY,
            inverse_total: None,
            rest_matrix: Mat4::IDENTITY,
            bind: BoneTransform::IDENTITY,
            pose_channel: None,
            pose_transform: None,
            local: BoneTransform::IDENTITY,
            model: BoneTransform::IDENTITY,
            user_control: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.flag & flags::CONNECTED_TO_PARENT != 0
    }

    /// 设置绑定变换并把当前局部变换恢复为绑定姿态
    pub fn set_bind(&mut self, bind: BoneTransform) {
        self.bind = bind;
        self.local = bind;
    }

    /// 恢复到绑定姿态
    pub fn reset(&mut self) {
        self.local = self.bind;
    }

    /// 用户变换（相对于绑定姿态），仅在 user_control 开启时生效
    pub fn set_user_transform(&mut self, user: &BoneTransform) -> bool {
        if !self.user_control {
            log::warn!("骨骼 {} 未开启用户控制，忽略用户变换", self.name);
            return false;
        }
        self.local = BoneTransform {
            translation: self.bind.translation + user.translation,
            rotation: (self.bind.rotation * user.rotation).normalize(),
            scale: self.bind.scale * user.scale,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_channel_axis_remap() {
        let record = PoseChannelRecord {
            loc: [1.0, 2.0, 3.0],
            quat: [1.0, 0.0, 0.0, 0.0],
            size: [1.0, 2.0, 3.0],
            ..PoseChannelRecord::default()
        };
        let fixed = PoseChannel::from_record(&record, true);
        assert_eq!(fixed.translation, Vec3::new(1.0, -3.0, 2.0));
        assert_eq!(fixed.scale, Vec3::new(1.0, 3.0, 2.0));

        let raw = PoseChannel::from_record(&record, false);
        assert_eq!(raw.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(raw.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_pose_channel_quaternion_remap() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        // 绕 Z 轴 90 度，重映射后 Z 轴对应 -Y 轴
        let record = PoseChannelRecord {
            quat: [half, 0.0, 0.0, half],
            ..PoseChannelRecord::default()
        };
        let channel = PoseChannel::from_record(&record, true);
        let expected = Quat::from_rotation_y(-std::f32::consts::FRAC_PI_2);
        assert!(channel.rotation.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_limits_ignored_on_locked_axes() {
        let channel = PoseChannel {
            ik_flag: ik_flags::LOCK_X | ik_flags::LIMIT_X | ik_flags::LIMIT_Z,
            ..PoseChannel::default()
        };
        assert!(channel.is_locked(0));
        assert!(!channel.has_limit(0));
        assert!(!channel.has_limit(1));
        assert!(channel.has_limit(2));
        assert!(!channel.is_locked(5));
    }

    #[test]
    fn test_user_transform_requires_control() {
        let mut bone = BoneNode::new("Arm");
        bone.set_bind(BoneTransform::new(Vec3::X, Quat::IDENTITY, Vec3::ONE));
        let user = BoneTransform::new(Vec3::Y, Quat::IDENTITY, Vec3::splat(2.0));

        assert!(!bone.set_user_transform(&user));
        assert_eq!(bone.local, bone.bind);

        bone.user_control = true;
        assert!(bone.set_user_transform(&user));
        assert_eq!(bone.local.translation, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(bone.local.scale, Vec3::splat(2.0));
    }
}
