//! Independent voltage and current sources.

use nalgebra::DVector;
use voltaic_core::{Device, DeviceClass, MnaSystem, Node, add_to_rhs};

use crate::waveform::Waveform;

/// An independent voltage source with a branch-current unknown.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    npos: Node,
    nneg: Node,
    branch: usize,
    src: Waveform,
}

impl VoltageSource {
    pub fn new(npos: Node, nneg: Node, branch: usize, src: Waveform) -> Self {
        Self {
            npos,
            nneg,
            branch,
            src,
        }
    }

    pub fn waveform(&self) -> &Waveform {
        &self.src
    }
}

impl Device for VoltageSource {
    fn load_linear(&self, mna: &mut MnaSystem) {
        let b = Node::new(self.branch);
        mna.add_gl(b, self.npos, 1.0);
        mna.add_gl(b, self.nneg, -1.0);
        mna.add_gl(self.npos, b, 1.0);
        mna.add_gl(self.nneg, b, -1.0);
    }

    fn load_dc(&self, _mna: &mut MnaSystem, _soln: &DVector<f64>, rhs: &mut DVector<f64>) {
        add_to_rhs(rhs, Node::new(self.branch), self.src.dc_value());
    }

    fn load_tran(
        &self,
        _mna: &mut MnaSystem,
        _soln: &DVector<f64>,
        rhs: &mut DVector<f64>,
        time: f64,
    ) {
        add_to_rhs(rhs, Node::new(self.branch), self.src.value(time));
    }

    fn load_ac(&self, rhs: &mut DVector<f64>) {
        add_to_rhs(rhs, Node::new(self.branch), 1.0);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.src.inflection_point(time)
    }

    fn branch(&self) -> Option<usize> {
        Some(self.branch)
    }

    fn source_period(&self) -> Option<f64> {
        let p = self.src.period();
        (p > 0.0).then_some(p)
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::VoltageSource
    }
}

/// An independent current source. Current flows from `npos` to `nneg`
/// through the source, so a source from ground into a node raises that
/// node's voltage across a grounding resistor.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    npos: Node,
    nneg: Node,
    src: Waveform,
}

impl CurrentSource {
    pub fn new(npos: Node, nneg: Node, src: Waveform) -> Self {
        Self { npos, nneg, src }
    }
}

impl Device for CurrentSource {
    fn load_linear(&self, _mna: &mut MnaSystem) {}

    fn load_dc(&self, _mna: &mut MnaSystem, _soln: &DVector<f64>, rhs: &mut DVector<f64>) {
        let is = self.src.dc_value();
        add_to_rhs(rhs, self.npos, -is);
        add_to_rhs(rhs, self.nneg, is);
    }

    fn load_tran(
        &self,
        _mna: &mut MnaSystem,
        _soln: &DVector<f64>,
        rhs: &mut DVector<f64>,
        time: f64,
    ) {
        let is = self.src.value(time);
        add_to_rhs(rhs, self.npos, -is);
        add_to_rhs(rhs, self.nneg, is);
    }

    fn load_ac(&self, rhs: &mut DVector<f64>) {
        add_to_rhs(rhs, self.npos, -1.0);
        add_to_rhs(rhs, self.nneg, 1.0);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.src.inflection_point(time)
    }

    fn source_period(&self) -> Option<f64> {
        let p = self.src.period();
        (p > 0.0).then_some(p)
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::CurrentSource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn test_voltage_source_stamp() {
        let mut mna = MnaSystem::new(3);
        let v = VoltageSource::new(Node::new(0), Node::new(1), 2, Waveform::dc(5.0));
        v.load_linear(&mut mna);
        assert_eq!(mna.gl[(2, 0)], 1.0);
        assert_eq!(mna.gl[(2, 1)], -1.0);
        assert_eq!(mna.gl[(0, 2)], 1.0);
        assert_eq!(mna.gl[(1, 2)], -1.0);

        let soln = dvector![0.0, 0.0, 0.0];
        let mut rhs = dvector![0.0, 0.0, 0.0];
        v.load_dc(&mut mna, &soln, &mut rhs);
        assert_eq!(rhs[2], 5.0);
    }

    #[test]
    fn test_voltage_source_ac_unity() {
        let mut rhs = dvector![0.0, 0.0, 0.0];
        let v = VoltageSource::new(Node::new(0), Node::GROUND, 2, Waveform::dc(5.0));
        v.load_ac(&mut rhs);
        assert_eq!(rhs[2], 1.0);
    }

    #[test]
    fn test_current_source_injection() {
        let mut mna = MnaSystem::new(1);
        let i = CurrentSource::new(Node::GROUND, Node::new(0), Waveform::dc(1e-3));
        let soln = dvector![0.0];
        let mut rhs = dvector![0.0];
        i.load_dc(&mut mna, &soln, &mut rhs);
        assert_eq!(rhs[0], 1e-3);
    }

    #[test]
    fn test_source_period_reported() {
        let v = VoltageSource::new(
            Node::new(0),
            Node::GROUND,
            1,
            Waveform::parse("sin(0,1,1k)"),
        );
        let p = v.source_period().unwrap();
        assert!((p - 1e-3).abs() < 1e-12);

        let d = VoltageSource::new(Node::new(0), Node::GROUND, 1, Waveform::dc(1.0));
        assert_eq!(d.source_period(), None);
    }
}
