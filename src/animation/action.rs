//! 动作（Action）
//!
//! 一个具名的可复用动画片段：特征名（骨骼名或对象名）到曲线集合的映射，加上帧率和结束帧。

use std::collections::{HashMap, HashSet};

use super::CurveSet;
use crate::config::AnimationMatchMethod;
use crate::{AnimError, Result};

/// 动作数据
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    name: String,
    fps: u32,
    /// 所有曲线集合中的最大最后帧（最小为 1）
    stop_frame: i32,
    /// 特征名 -> 曲线集合
    features: HashMap<String, CurveSet>,
}

impl Action {
    pub fn new(name: impl Into<String>, fps: u32) -> Self {
        Self {
            name: name.into(),
            fps: fps.max(1),
            stop_frame: 1,
            features: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn stop_frame(&self) -> i32 {
        self.stop_frame
    }

    /// 动画时长（秒）
    pub fn animation_time(&self) -> f32 {
        (self.stop_frame - 1) as f32 / self.fps as f32
    }

    /// 添加特征的曲线集合，同时更新结束帧
    pub fn insert_feature(&mut self, name: impl Into<String>, curves: CurveSet) {
        self.stop_frame = self.stop_frame.max(curves.last_frame());
        self.features.insert(name.into(), curves);
    }

    /// 查找特征
    pub fn feature(&self, name: &str) -> Result<&CurveSet> {
        self.features
            .get(name)
            .ok_or_else(|| AnimError::FeatureNotFound(format!("{} in action {}", name, self.name)))
    }

    pub fn features(&self) -> impl Iterator<Item = (&String, &CurveSet)> {
        self.features.iter()
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &String> {
        self.features.keys()
    }

    pub fn has_track_name(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn tracks_count(&self) -> usize {
        self.features.len()
    }

    /// 移除不在集合中的特征（结束帧保持不变）
    pub fn retain_features(&mut self, names: &HashSet<&str>) {
        self.features.retain(|name, _| names.contains(name.as_str()));
    }

    /// 按匹配方式判断动作能否用于骨架
    ///
    /// 返回供轨道构建使用的副本；不匹配时返回 None。
    pub fn match_bones<'a>(
        &self,
        bone_names: impl IntoIterator<Item = &'a str>,
        method: AnimationMatchMethod,
    ) -> Option<Action> {
        let matching: HashSet<&str> = bone_names
            .into_iter()
            .filter(|name| !name.is_empty() && self.has_track_name(name))
            .collect();

        match method {
            AnimationMatchMethod::AtLeastOneNameMatch if !matching.is_empty() => {
                let mut action = self.clone();
                action.retain_features(&matching);
                Some(action)
            }
            AnimationMatchMethod::AllNamesMatch
                if !self.features.is_empty() && matching.len() == self.tracks_count() =>
            {
                Some(self.clone())
            }
            _ => None,
        }
    }
}
