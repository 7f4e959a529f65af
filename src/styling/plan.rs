use super::{Beard, Brow, Ear, Eye, Hair, Mouth, Neck, Nose, Renderer, Side, Skin};
use crate::error::Error;
use crate::pipeline::parsing::RegionName;
use anyhow::Result;

#[derive(Debug, Clone)]
pub enum StepAction {
    Clean,
    Draw(Renderer),
}

#[derive(Debug, Clone)]
pub struct RenderStep {
    pub region: RegionName,
    pub action: StepAction,
    /// Region whose contours and mask the step reads. Its steps run first.
    pub depends_on: Option<RegionName>,
    /// Regions whose steps must have run before this one.
    pub after: Vec<RegionName>,
}

impl RenderStep {
    pub fn clean(region: RegionName) -> RenderStep {
        RenderStep {
            region,
            action: StepAction::Clean,
            depends_on: None,
            after: vec![],
        }
    }

    pub fn draw(region: RegionName, renderer: Renderer) -> RenderStep {
        RenderStep {
            region,
            action: StepAction::Draw(renderer),
            depends_on: None,
            after: vec![],
        }
    }

    pub fn depends_on(mut self, region: RegionName) -> RenderStep {
        self.depends_on = Some(region);
        self
    }

    pub fn after(mut self, regions: &[RegionName]) -> RenderStep {
        self.after.extend_from_slice(regions);
        self
    }

    fn prerequisites(&self) -> impl Iterator<Item = &RegionName> {
        self.depends_on.iter().chain(self.after.iter())
    }
}

/// Render steps in a validated execution order.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    steps: Vec<RenderStep>,
}

impl RenderPlan {
    /// Orders `steps` so every step runs after the steps of the regions it
    /// needs, keeping the declared order otherwise.
    pub fn new(steps: Vec<RenderStep>) -> Result<RenderPlan> {
        for step in &steps {
            for needed in step.prerequisites() {
                if !steps.iter().any(|s| s.region == *needed) {
                    return Err(Error::Config(format!("{} depends on unknown region {needed}", step.region)).into());
                }
            }
        }

        let mut placed = vec![false; steps.len()];
        let mut order = Vec::with_capacity(steps.len());
        while order.len() < steps.len() {
            let ready = (0..steps.len()).find(|&i| {
                !placed[i]
                    && steps[i].prerequisites().all(|needed| {
                        steps
                            .iter()
                            .enumerate()
                            .all(|(j, s)| j == i || s.region != *needed || placed[j])
                    })
            });

            let Some(i) = ready else {
                return Err(Error::Config("render plan has a dependency cycle".to_string()).into());
            };
            placed[i] = true;
            order.push(i);
        }

        let mut slots: Vec<Option<RenderStep>> = steps.into_iter().map(Some).collect();
        let steps = order.into_iter().filter_map(|i| slots[i].take()).collect();
        Ok(RenderPlan { steps })
    }

    pub fn steps(&self) -> &[RenderStep] {
        &self.steps
    }
}

impl RenderPlan {
    /// Cleans first, then the drawing steps.
    pub fn standard() -> Result<RenderPlan> {
        use RegionName as R;

        let steps = vec![
            RenderStep::clean(R::LeftEyeClean),
            RenderStep::clean(R::RightEyeClean),
            RenderStep::clean(R::LeftEyelidClean),
            RenderStep::clean(R::RightEyelidClean),
            RenderStep::clean(R::NoseClean),
            RenderStep::clean(R::InternMouthClean),
            RenderStep::clean(R::MouthClean),
            RenderStep::clean(R::Ear),
            RenderStep::clean(R::Brow),
            RenderStep::clean(R::Hair),
            RenderStep::draw(R::Skin, Renderer::Skin(Skin)),
            RenderStep::draw(R::Ear, Renderer::Ear(Ear)),
            RenderStep::draw(R::Hair, Renderer::Hair(Hair)).depends_on(R::Skin),
            RenderStep::draw(R::Brow, Renderer::Brow(Brow)),
            RenderStep::draw(R::Beard, Renderer::Beard(Beard))
                .depends_on(R::Ear)
                .after(&[R::Hair, R::Brow]),
            RenderStep::draw(R::Nose, Renderer::Nose(Nose)).depends_on(R::NoseClean),
            RenderStep::draw(R::LeftEye, Eye::new(Side::Left).into()).depends_on(R::LeftEyeClean),
            RenderStep::draw(R::RightEye, Eye::new(Side::Right).into()).depends_on(R::RightEyeClean),
            RenderStep::draw(R::Mouth, Renderer::Mouth(Mouth)).depends_on(R::MouthClean),
            RenderStep::draw(R::Neck, Renderer::Neck(Neck)),
        ];

        RenderPlan::new(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(plan: &RenderPlan) -> Vec<RegionName> {
        plan.steps().iter().map(|s| s.region).collect()
    }

    #[test]
    fn test_standard_plan_keeps_declared_order() {
        let plan = RenderPlan::standard().unwrap();
        let names = names(&plan);
        assert_eq!(names.len(), 20);
        assert_eq!(names[0], RegionName::LeftEyeClean);
        assert_eq!(names[10], RegionName::Skin);
        assert_eq!(names[14], RegionName::Beard);
        assert_eq!(names[19], RegionName::Neck);
    }

    #[test]
    fn test_dependencies_move_steps_later() {
        let steps = vec![
            RenderStep::draw(RegionName::Beard, Renderer::Beard(Beard))
                .depends_on(RegionName::Ear)
                .after(&[RegionName::Hair]),
            RenderStep::draw(RegionName::Hair, Renderer::Hair(Hair)),
            RenderStep::draw(RegionName::Ear, Renderer::Ear(Ear)),
            RenderStep::draw(RegionName::Skin, Renderer::Skin(Skin)),
        ];
        let plan = RenderPlan::new(steps).unwrap();
        assert_eq!(
            names(&plan),
            vec![RegionName::Hair, RegionName::Ear, RegionName::Beard, RegionName::Skin]
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let steps = vec![RenderStep::draw(RegionName::Mouth, Renderer::Mouth(Mouth)).depends_on(RegionName::MouthClean)];
        let err = RenderPlan::new(steps).unwrap_err();
        assert!(Error::is_fatal(&err));
    }

    #[test]
    fn test_cycle() {
        let steps = vec![
            RenderStep::draw(RegionName::Nose, Renderer::Nose(Nose)).depends_on(RegionName::Brow),
            RenderStep::draw(RegionName::Brow, Renderer::Brow(Brow)).depends_on(RegionName::Nose),
            RenderStep::draw(RegionName::Neck, Renderer::Neck(Neck)),
        ];
        assert!(RenderPlan::new(steps).is_err());
    }
}
