//! 骨架（骨骼数组 + 名称索引）

use std::collections::HashMap;

use super::{BoneNode, BoneTransform};
use crate::{AnimError, Result};

/// 骨架
///
/// 骨骼按父先子后的顺序存放，父子关系用索引表示。
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    name: String,
    bones: Vec<BoneNode>,
    name_to_index: HashMap<String, usize>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bones: Vec::new(),
            name_to_index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 添加骨骼，父骨骼必须已经存在
    pub fn add_bone(&mut self, mut bone: BoneNode) -> Result<usize> {
        let index = self.bones.len();
        if let Some(parent) = bone.parent_index {
            let parent_bone = self.bones.get_mut(parent).ok_or_else(|| {
                AnimError::InvalidHierarchyOrder(format!(
                    "bone {} added before its parent #{}",
                    bone.name, parent
                ))
            })?;
            parent_bone.children.push(index);
        }
        bone.children.clear();
        self.name_to_index.insert(bone.name.clone(), index);
        self.bones.push(bone);
        Ok(index)
    }

    /// 通过名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn get_bone(&self, index: usize) -> Option<&BoneNode> {
        self.bones.get(index)
    }

    pub fn get_bone_mut(&mut self, index: usize) -> Option<&mut BoneNode> {
        self.bones.get_mut(index)
    }

    pub fn bones(&self) -> &[BoneNode] {
        &self.bones
    }

    pub(crate) fn bones_mut(&mut self) -> &mut [BoneNode] {
        &mut self.bones
    }

    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.bones.iter().map(|b| b.name.as_str())
    }

    /// 根骨骼索引
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent_index.is_none())
            .map(|(i, _)| i)
    }

    /// 从 index 到根骨骼的索引链（包含两端）
    pub fn chain_to_root(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = self.bones.get(index).map(|_| index);
        while let Some(i) = current {
            chain.push(i);
            current = self.bones[i].parent_index;
        }
        chain
    }

    /// 所有骨骼恢复绑定姿态
    pub fn reset_all_transforms(&mut self) {
        for bone in &mut self.bones {
            bone.reset();
        }
        self.update_model_transforms();
    }

    /// 按父先子后的顺序更新模型空间变换
    pub fn update_model_transforms(&mut self) {
        for i in 0..self.bones.len() {
            let model = match self.bones[i].parent_index {
                Some(parent) => self.bones[i]
                    .local
                    .combine_with_parent(&self.bones[parent].model),
                None => self.bones[i].local,
            };
            self.bones[i].model = model;
        }
    }

    /// 模型空间变换（调用前需要 update_model_transforms）
    pub fn model_transform(&self, index: usize) -> Option<BoneTransform> {
        self.bones.get(index).map(|b| b.model)
    }

    pub fn set_user_control(&mut self, index: usize, enabled: bool) -> Result<()> {
        let bone = self.bone_mut_or_err(index)?;
        bone.user_control = enabled;
        Ok(())
    }

    /// 设置用户变换并刷新模型空间变换
    pub fn set_user_transform(&mut self, index: usize, user: &BoneTransform) -> Result<bool> {
        let applied = self.bone_mut_or_err(index)?.set_user_transform(user);
        if applied {
            self.update_model_transforms();
        }
        Ok(applied)
    }

    fn bone_mut_or_err(&mut self, index: usize) -> Result<&mut BoneNode> {
        let count = self.bones.len();
        self.bones
            .get_mut(index)
            .ok_or_else(|| AnimError::FeatureNotFound(format!("bone #{} of {}", index, count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn skeleton() -> Skeleton {
        let mut skeleton = Skeleton::new("Armature");
        let mut root = BoneNode::new("Root");
        root.set_bind(BoneTransform::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE));
        skeleton.add_bone(root).unwrap();

        let mut arm = BoneNode::new("Arm");
        arm.parent_index = Some(0);
        arm.set_bind(BoneTransform::new(
            Vec3::new(0.0, 2.0, 0.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::ONE,
        ));
        skeleton.add_bone(arm).unwrap();

        let mut hand = BoneNode::new("Hand");
        hand.parent_index = Some(1);
        hand.set_bind(BoneTransform::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE));
        skeleton.add_bone(hand).unwrap();

        skeleton.update_model_transforms();
        skeleton
    }

    #[test]
    fn test_lookup_and_children() {
        let skeleton = skeleton();
        assert_eq!(skeleton.find_bone_by_name("Hand"), Some(2));
        assert_eq!(skeleton.get_bone(0).unwrap().children, vec![1]);
        assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![0]);
        assert_eq!(skeleton.chain_to_root(2), vec![2, 1, 0]);
        assert!(skeleton.chain_to_root(9).is_empty());
    }

    #[test]
    fn test_parent_must_exist() {
        let mut skeleton = Skeleton::new("Broken");
        let mut orphan = BoneNode::new("Orphan");
        orphan.parent_index = Some(3);
        assert!(matches!(
            skeleton.add_bone(orphan),
            Err(AnimError::InvalidHierarchyOrder(_))
        ));
    }

    #[test]
    fn test_model_transforms() {
        let skeleton = skeleton();
        // Arm 绕 Z 轴 90 度，Hand 的 +Y 偏移变成 -X
        let hand = skeleton.model_transform(2).unwrap();
        assert!(hand.translation.abs_diff_eq(Vec3::new(-1.0, 3.0, 0.0), 1e-5));
    }

    #[test]
    fn test_user_transform() {
        let mut skeleton = skeleton();
        let user = BoneTransform::new(Vec3::new(0.0, 0.0, 1.0), Quat::IDENTITY, Vec3::ONE);
        assert!(!skeleton.set_user_transform(0, &user).unwrap());

        skeleton.set_user_control(0, true).unwrap();
        assert!(skeleton.set_user_transform(0, &user).unwrap());
        let root = skeleton.model_transform(0).unwrap();
        assert!(root.translation.abs_diff_eq(Vec3::new(0.0, 1.0, 1.0), 1e-6));

        assert!(skeleton.set_user_control(7, true).is_err());
    }
}
