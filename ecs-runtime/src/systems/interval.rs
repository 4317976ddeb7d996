// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Fixed-interval systems
//!
//! An [`IntervalAccumulator`] turns variable step deltas into a sequence of
//! fixed-length ticks. Leftover time carries over to the next step, so over
//! many steps the number of ticks matches the elapsed time exactly.

use std::any::type_name;

use crate::ecs::{Engine, EntitySystem};

/// Converts variable step deltas into fixed-length ticks
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalAccumulator {
    interval: f64,
    accumulator: f64,
    current_time: f64,
}

impl IntervalAccumulator {
    /// Create an accumulator that ticks every `interval` seconds
    pub fn new(interval: f64) -> Self {
        IntervalAccumulator {
            interval,
            accumulator: 0.0,
            current_time: 0.0,
        }
    }

    /// Length of one tick
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Simulated time of the next tick
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Restart the tick clock at `time`, e.g. the engine's current time
    pub fn set_current_time(&mut self, time: f64) {
        self.current_time = time;
    }

    /// Time carried over that has not yet filled a tick
    pub fn accumulated(&self) -> f64 {
        self.accumulator
    }

    /// Add `delta` and run `tick(current_time, interval)` once per whole
    /// interval accumulated.
    ///
    /// A non-positive interval ticks exactly once with `delta`. A failing
    /// tick stops the loop; its interval counts as consumed.
    pub fn advance<F>(&mut self, delta: f64, mut tick: F) -> anyhow::Result<()>
    where
        F: FnMut(f64, f64) -> anyhow::Result<()>,
    {
        if self.interval <= 0.0 {
            let time = self.current_time;
            self.current_time += delta;
            return tick(time, delta);
        }

        self.accumulator += delta;
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            let time = self.current_time;
            self.current_time += self.interval;
            tick(time, self.interval)?;
        }
        Ok(())
    }
}

/// Work run by an [`IntervalSystem`] once per tick
pub trait IntervalTask: 'static {
    /// Called when the owning system is added to `engine`
    fn added_to_engine(&mut self, _engine: &Engine) {}

    /// Called when the owning system is removed from `engine`
    fn removed_from_engine(&mut self, _engine: &Engine) {}

    /// Run one tick starting at `current_time` and lasting `interval`
    fn update_interval(&mut self, engine: &Engine, current_time: f64, interval: f64) -> anyhow::Result<()>;
}

/// A system that runs its task at a fixed interval instead of every step
pub struct IntervalSystem<T: IntervalTask> {
    task: T,
    timer: IntervalAccumulator,
    priority: i32,
    enabled: bool,
}

impl<T: IntervalTask> IntervalSystem<T> {
    /// Run `task` every `interval` seconds of simulated time
    pub fn new(interval: f64, task: T) -> Self {
        IntervalSystem {
            task,
            timer: IntervalAccumulator::new(interval),
            priority: 0,
            enabled: true,
        }
    }

    /// Set the execution priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable the system
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Length of one tick
    pub fn interval(&self) -> f64 {
        self.timer.interval()
    }

    /// The tick clock
    pub fn timer(&self) -> &IntervalAccumulator {
        &self.timer
    }

    /// The wrapped task
    pub fn task(&self) -> &T {
        &self.task
    }

    /// The wrapped task, mutably
    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }
}

impl<T: IntervalTask> EntitySystem for IntervalSystem<T> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn added_to_engine(&mut self, engine: &Engine) {
        self.timer.set_current_time(engine.current_time());
        self.task.added_to_engine(engine);
    }

    fn removed_from_engine(&mut self, engine: &Engine) {
        self.task.removed_from_engine(engine);
    }

    fn step(&mut self, engine: &Engine, delta_time: f64) -> anyhow::Result<()> {
        let task = &mut self.task;
        self.timer
            .advance(delta_time, |time, interval| task.update_interval(engine, time, interval))
    }

    fn name(&self) -> &str {
        type_name::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_carries_remainder() {
        let mut timer = IntervalAccumulator::new(0.5);
        let mut ticks = Vec::new();
        timer
            .advance(0.75, |t, i| {
                ticks.push((t, i));
                Ok(())
            })
            .unwrap();
        assert_eq!(ticks, vec![(0.0, 0.5)]);
        assert_eq!(timer.accumulated(), 0.25);

        timer
            .advance(0.75, |t, i| {
                ticks.push((t, i));
                Ok(())
            })
            .unwrap();
        assert_eq!(ticks, vec![(0.0, 0.5), (0.5, 0.5), (1.0, 0.5)]);
        assert_eq!(timer.current_time(), 1.5);
        assert_eq!(timer.accumulated(), 0.0);
    }

    #[test]
    fn test_accumulator_non_positive_interval() {
        let mut timer = IntervalAccumulator::new(0.0);
        let mut deltas = Vec::new();
        timer
            .advance(0.3, |_, d| {
                deltas.push(d);
                Ok(())
            })
            .unwrap();
        assert_eq!(deltas, vec![0.3]);
        assert_eq!(timer.current_time(), 0.3);
    }

    #[test]
    fn test_accumulator_stops_on_error() {
        let mut timer = IntervalAccumulator::new(1.0);
        let mut calls = 0;
        let result = timer.advance(3.0, |_, _| {
            calls += 1;
            anyhow::bail!("tick failed")
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert_eq!(timer.accumulated(), 2.0);
    }

    struct Counter {
        ticks: Vec<f64>,
    }

    impl IntervalTask for Counter {
        fn update_interval(&mut self, _engine: &Engine, current_time: f64, _interval: f64) -> anyhow::Result<()> {
            self.ticks.push(current_time);
            Ok(())
        }
    }

    #[test]
    fn test_interval_system_starts_at_engine_time() {
        let engine = Engine::with_start_time(5.0);
        let system = engine.add_system(IntervalSystem::new(1.0, Counter { ticks: Vec::new() }));
        assert_eq!(system.borrow().interval(), 1.0);

        engine.update(2.5).unwrap();
        assert_eq!(system.borrow().task().ticks, vec![5.0, 6.0]);
        assert_eq!(engine.systems().names(), vec![type_name::<Counter>()]);
    }
}
