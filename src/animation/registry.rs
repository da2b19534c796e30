//! 动作注册表
//!
//! 持有所有具名动作，按 (动作名, 目标) 缓存构建好的动画。

use std::collections::HashMap;

use super::{Action, ActionLoader, Animation, AnimationTarget, TargetKey, TrackBuilder};
use super::source::ActionRecord;
use crate::config::AnimationConfig;
use crate::skeleton::Skeleton;
use crate::{AnimError, Result};

/// 动作注册表
#[derive(Debug, Default)]
pub struct ActionRegistry {
    config: AnimationConfig,
    actions: HashMap<String, Action>,
    cache: HashMap<(String, TargetKey), Animation>,
}

impl ActionRegistry {
    pub fn new(config: AnimationConfig) -> Self {
        Self {
            config,
            actions: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// 注册动作，同名动作被替换并清除其缓存
    pub fn insert(&mut self, action: Action) -> Option<Action> {
        let name = action.name().to_string();
        self.invalidate(&name);
        self.actions.insert(name, action)
    }

    /// 用加载器加载并注册动作，返回注册数量
    pub fn load<'r>(
        &mut self,
        loader: &ActionLoader<'_>,
        records: impl IntoIterator<Item = &'r ActionRecord>,
    ) -> usize {
        let mut count = 0;
        for action in loader.load_all(records) {
            self.insert(action);
            count += 1;
        }
        log::info!("注册动作: {} 个 (共 {} 个)", count, self.actions.len());
        count
    }

    pub fn action(&self, name: &str) -> Result<&Action> {
        self.actions
            .get(name)
            .ok_or_else(|| AnimError::FeatureNotFound(format!("action {}", name)))
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// 可用于骨架的动作（按配置的匹配方式）
    pub fn actions_for_skeleton(&self, skeleton: &Skeleton) -> Vec<Action> {
        self.actions
            .values()
            .filter_map(|action| {
                action.match_bones(skeleton.bone_names(), self.config.match_method)
            })
            .collect()
    }

    /// 含有以节点命名的特征的动作
    pub fn actions_for_node(&self, node: &str) -> Vec<&Action> {
        self.actions
            .values()
            .filter(|action| action.has_track_name(node))
            .collect()
    }

    /// 取得（必要时构建）动作在目标上的动画
    ///
    /// 动作不存在或与目标不匹配时返回 `FeatureNotFound`。
    pub fn animation(&mut self, name: &str, target: &AnimationTarget<'_>) -> Result<&Animation> {
        let key = (name.to_string(), target.key());
        if !self.cache.contains_key(&key) {
            let animation = self.materialize(name, target)?;
            self.cache.insert(key.clone(), animation);
        }
        self.cache
            .get(&key)
            .ok_or_else(|| AnimError::FeatureNotFound(format!("animation {}", name)))
    }

    /// 目标可用的全部动画（动作名 -> 动画）
    pub fn animations(&mut self, target: &AnimationTarget<'_>) -> HashMap<String, Animation> {
        let names: Vec<String> = self.actions.keys().cloned().collect();
        let mut result = HashMap::new();
        for name in names {
            match self.animation(&name, target) {
                Ok(animation) => {
                    result.insert(name, animation.clone());
                }
                Err(e) => log::debug!("{}", e),
            }
        }
        result
    }

    /// 清除动作的缓存
    pub fn invalidate(&mut self, name: &str) {
        self.cache.retain(|(action, _), _| action != name);
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn materialize(&self, name: &str, target: &AnimationTarget<'_>) -> Result<Animation> {
        let action = self.action(name)?;
        let builder = TrackBuilder::new(&self.config);
        match target {
            AnimationTarget::Skeleton(skeleton) => {
                let matched = action
                    .match_bones(skeleton.bone_names(), self.config.match_method)
                    .ok_or_else(|| {
                        AnimError::FeatureNotFound(format!(
                            "action {} does not match skeleton {}",
                            name,
                            skeleton.name()
                        ))
                    })?;
                Ok(builder.build_animation(&matched, target))
            }
            AnimationTarget::Node { name: node, .. } => {
                if !action.has_track_name(node) {
                    return Err(AnimError::FeatureNotFound(format!(
                        "action {} has no feature {}",
                        name, node
                    )));
                }
                Ok(builder.build_animation(action, target))
            }
        }
    }
}
