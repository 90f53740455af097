use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::errors::{SchedulerError, SchedulerResult};
use crate::models::task::Task;

/// 有序的、以name为键的任务容器
///
/// 维持插入顺序，name在容器内唯一；重复添加同名任务会失败，
/// 永远不会静默覆盖已有任务。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// 从已有任务构建，重复name直接失败
    pub fn from_tasks(tasks: Vec<Task>) -> SchedulerResult<Self> {
        let mut list = Self::new();
        for task in tasks {
            list.add(task)?;
        }
        Ok(list)
    }

    pub fn add(&mut self, task: Task) -> SchedulerResult<()> {
        if self.contains(&task.name) {
            return Err(SchedulerError::already_scheduled(&task.name));
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Task> {
        let position = self.tasks.iter().position(|task| task.name == name)?;
        Some(self.tasks.remove(position))
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|task| task.name == name)
    }

    /// 按谓词筛选出一个新容器，原容器不变
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Task) -> bool,
    {
        Self {
            tasks: self
                .tasks
                .iter()
                .filter(|task| predicate(task))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.iter_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.tasks.iter().map(|task| task.name.clone()).collect()
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// 稳定排序，排序策略依赖"比较相等则保持相对顺序"的约定
    ///
    /// 比较器不要求构成全序：不参与重排的任务对返回Equal即可。
    /// 元素只在与前驱比较得到Less时左移，因此Equal保持相对顺序，
    /// 非全序比较器也不会引发panic（标准库排序会检测并拒绝这类
    /// 比较器）。
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Task, &Task) -> Ordering,
    {
        for i in 1..self.tasks.len() {
            let mut j = i;
            while j > 0 && compare(&self.tasks[j], &self.tasks[j - 1]) == Ordering::Less {
                self.tasks.swap(j, j - 1);
                j -= 1;
            }
        }
    }
}

impl IntoIterator for TaskList {
    type Item = Task;
    type IntoIter = std::vec::IntoIter<Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

impl<'a> IntoIterator for &'a TaskList {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}
