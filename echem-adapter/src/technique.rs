//! Simulated device-side technique state machines, driven one poll at a
//! time by `queue_core::run_to_completion`.

use rand::Rng;

use queue_core::{TechniqueSession, TechniqueStatus};

pub struct CyclicVoltammetrySession {
    start_v: f32,
    vertex_v: f32,
    scan_rate: f32,
    step: usize,
    steps_total: usize,
    points: Vec<(f32, f32)>,
}

impl CyclicVoltammetrySession {
    pub fn new(start_v: f32, vertex_v: f32, scan_rate: f32) -> Self {
        Self {
            start_v,
            vertex_v,
            scan_rate,
            step: 0,
            steps_total: 40,
            points: Vec::new(),
        }
    }
}

impl TechniqueSession for CyclicVoltammetrySession {
    type Data = Vec<(f32, f32)>;

    fn poll(&mut self) -> TechniqueStatus {
        if self.step >= self.steps_total {
            return TechniqueStatus::Completed;
        }
        let mut rng = rand::thread_rng();
        if rng.gen_bool(0.01) {
            return TechniqueStatus::Error;
        }

        let half = self.steps_total as f32 / 2.0;
        let voltage = if (self.step as f32) < half {
            self.start_v + (self.vertex_v - self.start_v) * (self.step as f32 / half)
        } else {
            self.vertex_v + (self.start_v - self.vertex_v) * ((self.step as f32 - half) / half)
        };
        let noise: f32 = rng.gen_range(-0.02..0.02);
        let current = self.scan_rate * 1e-3 * (voltage - self.start_v).abs() + noise;
        self.points.push((voltage, current));
        self.step += 1;

        if self.step == 1 {
            TechniqueStatus::Starting
        } else {
            TechniqueStatus::Running
        }
    }

    fn take_data(&mut self) -> Option<Vec<(f32, f32)>> {
        Some(std::mem::take(&mut self.points))
    }

    fn take_partial_data(&mut self) -> Option<Vec<(f32, f32)>> {
        if self.points.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.points))
        }
    }

    fn last_error(&self) -> String {
        "simulated cell disconnect mid-sweep".into()
    }
}

pub struct ChronoamperometrySession {
    potential_v: f32,
    duration_s: f32,
    step: usize,
    steps_total: usize,
    points: Vec<(f32, f32)>,
}

impl ChronoamperometrySession {
    pub fn new(potential_v: f32, duration_s: f32) -> Self {
        let steps_total = ((duration_s * 10.0).round() as usize).clamp(1, 200);
        Self {
            potential_v,
            duration_s,
            step: 0,
            steps_total,
            points: Vec::new(),
        }
    }
}

impl TechniqueSession for ChronoamperometrySession {
    type Data = Vec<(f32, f32)>;

    fn poll(&mut self) -> TechniqueStatus {
        if self.step >= self.steps_total {
            return TechniqueStatus::Completed;
        }
        let t = (self.step as f32 + 1.0) * (self.duration_s / self.steps_total as f32);
        let noise: f32 = rand::thread_rng().gen_range(-0.005..0.005);
        // Cottrell-shaped decay: current falls off as 1/sqrt(t).
        let current = self.potential_v.abs() * 0.5 / t.sqrt() + noise;
        self.points.push((t, current));
        self.step += 1;

        if self.step == 1 {
            TechniqueStatus::Starting
        } else {
            TechniqueStatus::Running
        }
    }

    fn take_data(&mut self) -> Option<Vec<(f32, f32)>> {
        Some(std::mem::take(&mut self.points))
    }

    fn take_partial_data(&mut self) -> Option<Vec<(f32, f32)>> {
        if self.points.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.points))
        }
    }

    fn last_error(&self) -> String {
        "simulated potentiostat fault".into()
    }
}
